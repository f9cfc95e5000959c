//! Escape-sequence decoding for string and character literals.
//!
//! The control-character escapes apply the Rez CR/LF swap: classic Mac OS
//! used CR as its line ending, so `\n` produces 0x0D and `\r` produces 0x0A.

use std::{iter::Peekable, str::Chars};

use crate::macroman;

/// Decodes the body of a string or character literal (without its quotes)
/// into Mac OS Roman bytes. Errors carry only a message; the caller knows
/// the position.
pub fn decode_escapes(body: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(encode_one(c)?);
            continue;
        }
        let Some(escape) = chars.next() else {
            return Err(String::from("escape at end of literal"));
        };
        match escape {
            't' => out.push(0x09),
            'b' => out.push(0x08),
            // CR and LF trade places on classic Mac OS.
            'r' => out.push(0x0A),
            'n' => out.push(0x0D),
            'f' => out.push(0x0C),
            'v' => out.push(0x0B),
            '?' => out.push(0x7F),
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            '$' => out.push(digits(&mut chars, 2, 16)? as u8),
            '0' => match chars.peek() {
                Some('b' | 'B') => {
                    chars.next();
                    out.push(digits(&mut chars, 8, 2)? as u8);
                }
                Some('d' | 'D') => {
                    chars.next();
                    let value = digits(&mut chars, 3, 10)?;
                    if value > 0xFF {
                        return Err(format!("decimal escape value {value} out of range"));
                    }
                    out.push(value as u8);
                }
                Some('x' | 'X') => {
                    chars.next();
                    out.push(digits(&mut chars, 2, 16)? as u8);
                }
                _ => out.push(digits(&mut chars, 2, 8)? as u8),
            },
            first @ '1'..='3' => {
                let first = first.to_digit(8).unwrap();
                out.push((first * 64 + digits(&mut chars, 2, 8)?) as u8);
            }
            other => out.push(encode_one(other)?),
        }
    }
    Ok(out)
}

/// Decodes a character literal (with its quotes) into the big-endian integer
/// interpretation of its bytes.
pub fn decode_char_literal(lexeme: &str) -> Result<i64, String> {
    let body = lexeme
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .ok_or_else(|| String::from("malformed character literal"))?;
    let bytes = decode_escapes(body)?;
    if bytes.len() > 8 {
        return Err(format!(
            "character literal is {} bytes long, the maximum is 8",
            bytes.len()
        ));
    }
    Ok(bytes
        .iter()
        .fold(0u64, |value, &byte| (value << 8) | u64::from(byte)) as i64)
}

fn encode_one(c: char) -> Result<u8, String> {
    macroman::encode_char(c)
        .ok_or_else(|| format!("character {c:?} has no Mac OS Roman encoding"))
}

fn digits(chars: &mut Peekable<Chars>, count: u32, radix: u32) -> Result<u32, String> {
    let mut value = 0;
    for _ in 0..count {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(radix))
            .ok_or_else(|| format!("escape is missing its base-{radix} digits"))?;
        value = value * radix + digit;
    }
    Ok(value)
}
