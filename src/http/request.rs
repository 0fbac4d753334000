//! Options recognized by the verb methods.

use anyhow::{Context, Result};
use reqwest::RequestBuilder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};

/// Query parameters, headers and body for one request.
///
/// Options are kept as plain data rather than a `RequestBuilder` so a request
/// can be rebuilt for every retry attempt.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` key/value pairs.
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds a form field, replacing any non-form body.
    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self.body {
            RequestBody::Form(fields) => fields.push((key.into(), value.into())),
            _ => self.body = RequestBody::Form(vec![(key.into(), value.into())]),
        }
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn multipart(mut self, body: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(body);
        self
    }

    /// Applies the options to a fresh request builder.
    pub(crate) fn apply(&self, mut builder: RequestBuilder) -> Result<RequestBuilder> {
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if !self.headers.is_empty() {
            builder = builder.headers(self.headers.clone());
        }
        builder = match &self.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(body) => builder.multipart(body.to_form()?),
        };
        Ok(builder)
    }
}

/// A `multipart/form-data` body of text fields and file parts.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

#[derive(Clone)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("filename", &self.filename)
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(
        mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        content: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        self.files.push(FilePart {
            field: field.into(),
            filename: filename.into(),
            content,
            content_type: content_type.into(),
        });
        self
    }

    fn to_form(&self) -> Result<Form> {
        let mut form = Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let part = Part::bytes(file.content.clone())
                .file_name(file.filename.clone())
                .mime_str(&file.content_type)
                .with_context(|| format!("Invalid content type {:?}", file.content_type))?;
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::ACCEPT;

    #[test]
    fn test_builder_collects_query_and_headers() {
        let options = RequestOptions::new()
            .query("key", "value")
            .query("page", "2")
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        assert_eq!(
            options.query,
            vec![
                ("key".to_string(), "value".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert_eq!(options.headers[ACCEPT], "application/json");
        assert!(matches!(options.body, RequestBody::Empty));
    }

    #[test]
    fn test_form_field_appends_to_form() {
        let options = RequestOptions::new()
            .form_field("key", "value")
            .form_field("other", "1");

        match options.body {
            RequestBody::Form(fields) => assert_eq!(fields.len(), 2),
            other => panic!("Expected form body, got {:?}", other),
        }
    }

    #[test]
    fn test_form_field_replaces_json_body() {
        let options = RequestOptions::new()
            .json(serde_json::json!({"a": 1}))
            .form_field("key", "value");

        assert!(matches!(options.body, RequestBody::Form(ref f) if f.len() == 1));
    }

    #[test]
    fn test_file_part_debug_hides_content() {
        let body = MultipartBody::new().file("attachment", "image.tiff", vec![0; 2048], "image/tiff");
        let debug = format!("{:?}", body);
        assert!(debug.contains("<2048 bytes>"));
        assert!(debug.contains("image.tiff"));
    }

    #[test]
    fn test_to_form_rejects_invalid_content_type() {
        let body = MultipartBody::new().file("attachment", "image.tiff", vec![], "not a mime");
        assert!(body.to_form().is_err());
    }

    #[test]
    fn test_apply_builds_query_string() {
        let client = reqwest::Client::new();
        let options = RequestOptions::new().query("key", "value");

        let request = options
            .apply(client.get("http://localhost/images"))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.url().as_str(), "http://localhost/images?key=value");
    }
}
