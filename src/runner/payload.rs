use crate::model::{BodyPart, Header, Request};
use crate::Result;
use anyhow::Context;
use encoding_rs::{Encoding, UTF_8};
use std::fs;
use std::path::Path;

/// Builds the bytes sent as the request body, if the request has one.
///
/// Text is encoded with the request's `charset`. Files in a flat body are
/// read as text in that charset. Files inside multipart fields are sent
/// as they are on disk.
pub fn payload(request: &Request, base_dir: &Path) -> Result<Option<Vec<u8>>> {
    let parts = match request.message_body() {
        Some(parts) => parts,
        None => return Ok(None),
    };
    let encoding = encoding(request.charset().as_deref())?;

    let is_multipart = parts
        .iter()
        .any(|part| matches!(part, BodyPart::MultipartField(_)));
    if !is_multipart {
        let text = flat_text(parts, base_dir, encoding)?;
        return Ok(Some(encode(&text, encoding)));
    }

    let boundary = request
        .multipart_boundary()
        .ok_or_else(|| anyhow!("Multipart body without a boundary"))?;
    let mut body = Vec::new();
    for part in parts {
        if let BodyPart::MultipartField(multipart) = part {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            for Header { field, value } in &multipart.headers {
                body.extend_from_slice(&encode(&format!("{}: {}\r\n", field, value), encoding));
            }
            body.extend_from_slice(b"\r\n");
            for part in &multipart.parts {
                match part {
                    BodyPart::ContentLine(line) => body.extend_from_slice(&encode(line, encoding)),
                    BodyPart::InputFileRef(path) => body.extend_from_slice(&read_file(path, base_dir)?),
                    BodyPart::MultipartField(_) => return Err(anyhow!("Nested multipart field")),
                }
            }
            body.extend_from_slice(b"\r\n");
        }
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    Ok(Some(body))
}

fn flat_text(parts: &[BodyPart], base_dir: &Path, encoding: &'static Encoding) -> Result<String> {
    let mut text = String::new();
    for part in parts {
        match part {
            BodyPart::ContentLine(line) => text.push_str(line),
            BodyPart::InputFileRef(path) => {
                let bytes = read_file(path, base_dir)?;
                let (decoded, _, malformed) = encoding.decode(&bytes);
                if malformed {
                    return Err(anyhow!("{} is not valid {}", path, encoding.name()));
                }
                text.push_str(&decoded);
            }
            BodyPart::MultipartField(_) => return Err(anyhow!("Unexpected multipart field")),
        }
    }
    Ok(text)
}

fn read_file(path: &str, base_dir: &Path) -> Result<Vec<u8>> {
    let path = base_dir.join(path);
    fs::read(&path).with_context(|| format!("Failed reading {}", path.display()))
}

/// Looks up a charset label, UTF-8 when there is none.
pub fn encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or_else(|| anyhow!("Unsupported charset: {}", label)),
        None => Ok(UTF_8),
    }
}

fn encode(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    encoding.encode(text).0.into_owned()
}
