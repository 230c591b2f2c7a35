//! Transport-neutral description of one backend call.
//!
//! Endpoint descriptors build a `RequestSpec` from their arguments with a
//! pure function; the executor turns it into an actual HTTP request.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single file sent as a `multipart/form-data` part.
#[derive(Clone, PartialEq)]
pub struct FileUpload {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Method, path segments, query pairs, extra headers and a body.
///
/// The body is either JSON or a file upload, never both. Path segments are
/// stored unencoded; the executor percent-encodes each one when it joins
/// them onto the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub upload: Option<FileUpload>,
}

impl RequestSpec {
    pub fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            upload: None,
        }
    }

    pub fn get(segments: &[&str]) -> Self {
        Self::new(Method::Get, segments)
    }

    pub fn post(segments: &[&str]) -> Self {
        Self::new(Method::Post, segments)
    }

    pub fn put(segments: &[&str]) -> Self {
        Self::new(Method::Put, segments)
    }

    pub fn patch(segments: &[&str]) -> Self {
        Self::new(Method::Patch, segments)
    }

    pub fn delete(segments: &[&str]) -> Self {
        Self::new(Method::Delete, segments)
    }

    pub fn with_query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self.upload = None;
        self
    }

    /// Send `upload` as multipart form data instead of a JSON body.
    pub fn with_upload(mut self, upload: FileUpload) -> Self {
        self.upload = Some(upload);
        self.body = None;
        self
    }

    pub fn with_json<B: Serialize>(self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        Ok(self.with_body(value))
    }

    /// Human-readable path for logs, e.g. `/records/user/u1/latest`.
    pub fn display_path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment);
        }
        if path.is_empty() {
            path.push('/');
        }
        if !self.query.is_empty() {
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            path.push('?');
            path.push_str(&pairs.join("&"));
        }
        path
    }
}

/// Read a required string field out of an endpoint argument.
///
/// A bare string argument is accepted when `field` is the sole argument.
pub fn arg_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ApiError> {
    match args {
        Value::String(s) => Ok(s.as_str()),
        Value::Object(map) => map
            .get(field)
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::InvalidRequest(format!("missing argument '{}'", field))),
        _ => Err(ApiError::InvalidRequest(format!(
            "missing argument '{}'",
            field
        ))),
    }
}

/// Read a nested object field out of an endpoint argument.
pub fn arg_field<'a>(args: &'a Value, field: &str) -> Result<&'a Value, ApiError> {
    args.get(field)
        .ok_or_else(|| ApiError::InvalidRequest(format!("missing argument '{}'", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_path() {
        let spec = RequestSpec::get(&["records", "user", "u1", "date-range"])
            .with_query("startDate", "2024-01-01")
            .with_query("endDate", "2024-01-31");
        assert_eq!(
            spec.display_path(),
            "/records/user/u1/date-range?startDate=2024-01-01&endDate=2024-01-31"
        );
        assert_eq!(RequestSpec::get(&[]).display_path(), "/");
    }

    #[test]
    fn test_arg_str() {
        assert_eq!(arg_str(&json!("abc"), "id").ok(), Some("abc"));
        assert_eq!(arg_str(&json!({"id": "abc"}), "id").ok(), Some("abc"));
        assert!(matches!(
            arg_str(&json!({"other": 1}), "id"),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(arg_str(&Value::Null, "id").is_err());
    }

    #[test]
    fn test_with_json() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            rich_menu_id: String,
        }
        let spec = RequestSpec::post(&["line", "rich-menu", "default"])
            .with_json(&Body {
                rich_menu_id: "rm-1".to_string(),
            })
            .expect("body should encode");
        assert_eq!(spec.body, Some(json!({"richMenuId": "rm-1"})));
        assert_eq!(spec.method.as_str(), "POST");
    }

    #[test]
    fn test_upload_replaces_json_body() {
        let spec = RequestSpec::post(&["line", "rich-menu", "upload"])
            .with_body(json!({"stale": true}))
            .with_header("rich-menu-id", "rm-1")
            .with_upload(FileUpload {
                field: "image".to_string(),
                file_name: "menu.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: vec![0x89, b'P', b'N', b'G'],
            });
        assert!(spec.body.is_none());
        assert_eq!(spec.headers, vec![("rich-menu-id".to_string(), "rm-1".to_string())]);
        let upload = spec.upload.as_ref().expect("upload set");
        assert_eq!(upload.bytes.len(), 4);
        assert!(format!("{:?}", upload).contains("len: 4"));
    }
}
