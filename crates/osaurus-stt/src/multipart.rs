//! Minimal `multipart/form-data` parsing for audio uploads
//!
//! The parser never fails. Parts it cannot make sense of are skipped and the
//! caller decides whether a missing field or file is an error.

use std::collections::HashMap;

use bytes::Bytes;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// The uploaded file part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name the file was sent under
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Decoded form: plain fields plus at most one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<FilePart>,
}

impl MultipartForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Boundary parameter of a `multipart/form-data` content type
pub fn boundary(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');

    let essence = params.next()?.trim();
    if !essence.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }

    params.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }

        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_owned())
    })
}

/// Split `body` on `--boundary` and decode each part
///
/// Later files replace earlier ones, as do later fields with the same name.
pub fn parse(body: &[u8], boundary: &str) -> MultipartForm {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut form = MultipartForm::default();
    let mut positions = find_all(body, delimiter).into_iter().peekable();

    while let Some(start) = positions.next() {
        let part_start = start + delimiter.len();
        let part_end = positions.peek().copied().unwrap_or(body.len());
        let raw = &body[part_start..part_end];

        // Closing delimiter `--boundary--`
        if raw.starts_with(b"--") {
            break;
        }

        let raw = raw.strip_prefix(b"\r\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r\n").unwrap_or(raw);

        let Some(split) = find(raw, HEADER_END) else {
            continue;
        };
        let headers = String::from_utf8_lossy(&raw[..split]);
        let content = &raw[split + HEADER_END.len()..];

        let Some(disposition) = header_value(&headers, "content-disposition") else {
            continue;
        };
        let Some(name) = disposition_param(disposition, "name") else {
            continue;
        };

        match disposition_param(disposition, "filename") {
            Some(filename) => {
                form.file = Some(FilePart {
                    name,
                    filename,
                    content_type: header_value(&headers, "content-type").map(str::to_owned),
                    data: Bytes::copy_from_slice(content),
                });
            }
            None => {
                form.fields
                    .insert(name, String::from_utf8_lossy(content).into_owned());
            }
        }
    }

    form
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut offset = 0;

    while let Some(found) = find(&haystack[offset..], needle) {
        positions.push(offset + found);
        offset += found + needle.len();
    }

    positions
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.split("\r\n").find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// `name="value"` (or unquoted) parameter of a `Content-Disposition` value
fn disposition_param(disposition: &str, param: &str) -> Option<String> {
    disposition.split(';').skip(1).find_map(|segment| {
        let (key, value) = segment.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case(param)
            .then(|| value.trim().trim_matches('"').to_owned())
    })
}

#[cfg(test)]
pub(crate) fn encode(boundary: &str, fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }

    if let Some((name, filename, data)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: audio/wav\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_and_file_survive_encoding() {
        let audio: &[u8] = &[0, 159, 146, 150, b'\r', b'\n', 255, 1];
        let body = encode(
            "XyZ",
            &[("model", "whisper-1"), ("response_format", "verbose_json")],
            Some(("file", "clip.wav", audio)),
        );

        let form = parse(&body, "XyZ");
        assert_eq!(form.field("model"), Some("whisper-1"));
        assert_eq!(form.field("response_format"), Some("verbose_json"));

        let file = form.file.unwrap();
        assert_eq!(file.name, "file");
        assert_eq!(file.filename, "clip.wav");
        assert_eq!(file.content_type.as_deref(), Some("audio/wav"));
        assert_eq!(file.data.as_ref(), audio);
    }

    #[test]
    fn last_field_and_file_win() {
        let mut body = encode("b", &[("model", "first"), ("model", "second")], Some(("file", "a.wav", b"A")));
        // Drop the closing delimiter and append another file
        body.truncate(body.len() - "--b--\r\n".len());
        body.extend_from_slice(&encode("b", &[], Some(("file", "b.wav", b"B"))));

        let form = parse(&body, "b");
        assert_eq!(form.field("model"), Some("second"));
        assert_eq!(form.file.unwrap().filename, "b.wav");
    }

    #[test]
    fn malformed_parts_are_skipped() {
        let body = b"--b\r\nno separator here\r\n--b\r\nContent-Disposition: form-data\r\n\r\nno name\r\n--b\r\nContent-Disposition: form-data; name=\"ok\"\r\n\r\nyes\r\n--b--\r\n";

        let form = parse(body, "b");
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.field("ok"), Some("yes"));
        assert!(form.file.is_none());
    }

    #[test]
    fn body_without_boundary_is_empty() {
        assert_eq!(parse(b"plain text", "b"), MultipartForm::default());
    }

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(
            boundary("multipart/form-data; boundary=----abc").as_deref(),
            Some("----abc")
        );
        assert_eq!(
            boundary("Multipart/Form-Data; charset=utf-8; boundary=\"quoted\"").as_deref(),
            Some("quoted")
        );
        assert_eq!(boundary("application/json; boundary=x"), None);
        assert_eq!(boundary("multipart/form-data"), None);
    }
}
