//! Request-related types.
//!
//! - [`Request`] - An outgoing HTTP request
//! - [`HttpMethod`] - Supported verbs
//! - [`ContentType`] - Body encodings
//! - [`MultipartFile`] - File part of a multipart upload

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::error::CoreError;

/// Header name that always reflects the body encoding.
const CONTENT_TYPE: &str = "Content-Type";

// ============================================================================
// HTTP Method
// ============================================================================

/// HTTP verbs supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Returns the method as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Content Type
// ============================================================================

/// Encoding of a request body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContentType {
    /// `application/json`
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    UrlEncoded,
    /// `multipart/form-data` with the given boundary.
    Multipart {
        /// Part boundary.
        boundary: String,
    },
}

impl ContentType {
    /// Returns the `Content-Type` header value.
    pub fn header_value(&self) -> String {
        match self {
            Self::Json => "application/json".to_string(),
            Self::UrlEncoded => "application/x-www-form-urlencoded".to_string(),
            Self::Multipart { boundary } => format!("multipart/form-data; boundary={boundary}"),
        }
    }
}

// ============================================================================
// Multipart File
// ============================================================================

/// A file uploaded as one part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    /// File name sent in `Content-Disposition`.
    pub name: String,
    /// MIME type of the data.
    pub mime_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl MultipartFile {
    /// Creates a multipart file.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// An outgoing HTTP request.
///
/// The `Content-Type` header is derived from the body encoding and cannot be
/// overridden; every other caller supplied header is sent as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: HttpMethod,
    url: Url,
    headers: BTreeMap<String, String>,
    body: Option<Vec<u8>>,
    content_type: ContentType,
}

impl Request {
    /// Creates a request with no body and a JSON content type.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
            content_type: ContentType::Json,
        }
    }

    /// Creates a GET request for the given URL string.
    pub fn get(url: &str) -> Result<Self, CoreError> {
        Ok(Self::new(HttpMethod::Get, Url::parse(url)?))
    }

    /// Creates a DELETE request for the given URL string.
    pub fn delete(url: &str) -> Result<Self, CoreError> {
        Ok(Self::new(HttpMethod::Delete, Url::parse(url)?))
    }

    /// Creates a POST request with a JSON body.
    pub fn post_json<T: Serialize + ?Sized>(url: &str, body: &T) -> Result<Self, CoreError> {
        Self::new(HttpMethod::Post, Url::parse(url)?).with_json(body)
    }

    /// Creates a POST request with a URL-encoded form body.
    pub fn post_form<I, K, V>(url: &str, items: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Self::new(HttpMethod::Post, Url::parse(url)?).with_form(items))
    }

    /// Appends query items to the URL.
    #[must_use]
    pub fn with_query<I, K, V>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut items = items.into_iter().peekable();
        if items.peek().is_some() {
            self.url.query_pairs_mut().extend_pairs(items);
        }
        self
    }

    /// Adds a header. `Content-Type` is ignored; it follows the body encoding.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if !name.eq_ignore_ascii_case(CONTENT_TYPE) {
            self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
            self.headers.insert(name, value.into());
        }
        self
    }

    /// Adds several headers.
    #[must_use]
    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |request, (name, value)| request.with_header(name, value))
    }

    /// Sets a JSON body.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, CoreError> {
        self.body = Some(serde_json::to_vec(body)?);
        self.content_type = ContentType::Json;
        Ok(self)
    }

    /// Sets a URL-encoded form body.
    #[must_use]
    pub fn with_form<I, K, V>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(items)
            .finish();
        self.body = Some(encoded.into_bytes());
        self.content_type = ContentType::UrlEncoded;
        self
    }

    /// Sets a multipart body made of plain fields followed by file parts.
    ///
    /// Each file is sent under the form field `field_name`.
    #[must_use]
    pub fn with_multipart<I, K, V>(
        mut self,
        fields: I,
        field_name: &str,
        files: &[MultipartFile],
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let boundary = format!("netkit-{}", Uuid::new_v4().simple());
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name.as_ref()
                )
                .as_bytes(),
            );
            body.extend_from_slice(value.as_ref().as_bytes());
            body.extend_from_slice(b"\r\n");
        }

        for file in files {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{}\"\r\n",
                    file.name
                )
                .as_bytes(),
            );
            body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.mime_type).as_bytes());
            body.extend_from_slice(&file.data);
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        self.body = Some(body);
        self.content_type = ContentType::Multipart { boundary };
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the URL, including query items.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the body encoding.
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Returns the body bytes, if any.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Returns every header that will be sent, `Content-Type` included.
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        headers.insert(CONTENT_TYPE.to_string(), self.content_type.header_value());
        headers
    }
}

// ============================================================================
// Tests
// ============================================================================
