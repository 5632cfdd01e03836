use std::collections::HashMap;

/// Inbound request accessor object.
///
/// The core sits behind an already-parsed request; this carries just the
/// pieces the dispatcher and emitter consume.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl Request {
    /// Build a request from a method and a target such as `/users?page=2`
    pub fn new(method: &str, target: &str) -> Self {
        let (path, query_string) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        Self {
            method: method.to_uppercase(),
            path: path.to_string(),
            headers: HashMap::new(),
            query: parse_query(query_string),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Header value by case-insensitive name; empty string when absent
    pub fn header_line(&self, name: &str) -> &str {
        self.headers
            .get(&name.to_lowercase())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    let mut result = HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key).map(|k| k.into_owned());
        let value = urlencoding::decode(value).map(|v| v.into_owned());
        if let (Ok(key), Ok(value)) = (key, value) {
            result.insert(key, value);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_from_target() {
        let req = Request::new("get", "/search?q=hello%20world&page=2");
        assert_eq!(req.method(), "GET");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query().get("q").map(String::as_str), Some("hello world"));
        assert_eq!(req.query().get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::new("GET", "/").with_header("Accept-Encoding", "gzip, deflate");
        assert_eq!(req.header_line("accept-encoding"), "gzip, deflate");
        assert_eq!(req.header_line("X-Missing"), "");
    }
}
