//! Include-file resolution: search paths and the Apple-style framework
//! rewrite.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use rez_foundation::errors::RezError;
use rez_lexer::Lexer;
use tracing::trace;

use crate::{IncludeFrame, Preprocessor};

/// Where include files come from. The preprocessor only ever asks for
/// candidate paths; everything else (search order, framework rewrites) is
/// its own business.
pub trait FileSource {
    /// `Ok(None)` when the file does not exist at this path; `Err` only for
    /// real I/O failures.
    fn read(&mut self, path: &Utf8Path) -> io::Result<Option<String>>;
}

/// Reads UTF-8 files from the process filesystem.
pub struct FsFileSource;

impl FileSource for FsFileSource {
    fn read(&mut self, path: &Utf8Path) -> io::Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl Preprocessor {
    /// Finds an include file and seeds a lexer frame with its content.
    ///
    /// Search order: the `Frameworks` subdirectory of every framework on
    /// the include stack (innermost first), then the user include path for
    /// quoted includes, then the system include path. In each directory the
    /// plain name is tried first, then the framework rewrite
    /// (`Carbon/Carbon.r` → `Carbon.framework/Headers/Carbon.r`).
    pub(crate) fn resolve_include(
        &mut self,
        name: &str,
        angled: bool,
    ) -> Result<IncludeFrame, RezError> {
        let mut directories: Vec<Utf8PathBuf> = self
            .include_stack
            .iter()
            .rev()
            .filter_map(|frame| {
                frame
                    .framework
                    .as_ref()
                    .map(|root| root.join("Frameworks"))
            })
            .collect();
        if !angled {
            directories.extend(self.include_path.iter().cloned());
        }
        directories.extend(self.sys_include_path.iter().cloned());

        for directory in &directories {
            let direct = directory.join(name);
            if let Some(text) = self.read_candidate(&direct)? {
                trace!(path = %direct, "resolved include");
                return Ok(IncludeFrame {
                    lexer: Lexer::new(name, &text),
                    framework: None,
                });
            }

            let path = Utf8Path::new(name);
            let parent = path.parent().filter(|parent| !parent.as_str().is_empty());
            if let (Some(parent), Some(file_name)) = (parent, path.file_name()) {
                let framework_root = directory.join(format!("{parent}.framework"));
                let framework_path = framework_root.join("Headers").join(file_name);
                if let Some(text) = self.read_candidate(&framework_path)? {
                    trace!(path = %framework_path, "resolved framework include");
                    return Ok(IncludeFrame {
                        lexer: Lexer::new(name, &text),
                        framework: Some(framework_root),
                    });
                }
            }
        }
        Err(self.error(format!(
            "include file {name:?} not found on the search path"
        )))
    }

    fn read_candidate(&mut self, path: &Utf8Path) -> Result<Option<String>, RezError> {
        let result = self.file_source.read(path);
        result.map_err(|error| self.error(format!("cannot read {path}: {error}")))
    }
}
