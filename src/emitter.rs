//! Response emission.
//!
//! The emitter turns a finished `Response` into bytes on a transport:
//! fallback body creation when the stream is empty, gzip negotiation,
//! content-length and cache headers, HEAD body suppression, and the
//! header/body write order.

use crate::error::bridge::{ErrorBridge, ErrorLevel, ProcessErrorState, CATCH_ALL};
use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::views::ViewEngine;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Template rendered when the response stream is empty
const FALLBACK_VIEW: &str = "index";

pub struct Emitter {
    view: Arc<dyn ViewEngine>,
    default_cache_ttl: u64,
    buffer: String,
    is_gzipped: bool,
    is_buffered: bool,
    error_message: Arc<Mutex<Option<String>>>,
}

impl Emitter {
    pub fn new(view: Arc<dyn ViewEngine>) -> Self {
        Self {
            view,
            default_cache_ttl: 0,
            buffer: String::new(),
            is_gzipped: false,
            is_buffered: false,
            error_message: Arc::new(Mutex::new(None)),
        }
    }

    pub fn view(&self) -> &Arc<dyn ViewEngine> {
        &self.view
    }

    /// Cache lifetime in seconds applied when the response carries no
    /// Cache-Control of its own. Zero means the default is "do not cache".
    pub fn set_default_cache_ttl(&mut self, ttl: u64) {
        self.default_cache_ttl = ttl;
    }

    /// Capture side-channel output; when set it overrides the body stream's
    /// natural content at emission time
    pub fn output_buffer(&mut self, content: &str) {
        self.buffer.push_str(content);
    }

    pub fn is_gzipped(&self) -> bool {
        self.is_gzipped
    }

    pub fn is_buffered(&self) -> bool {
        self.is_buffered
    }

    /// Build the runtime-error trap wired to this emitter.
    ///
    /// Trapped faults store their message for the fallback page. With
    /// display on, `nice_error` re-binds the view to a 500 template;
    /// otherwise the fault escalates as a structured error.
    pub fn error_handler(
        &self,
        display_errors: bool,
        nice_error: bool,
        log_errors: bool,
        log_file: Option<PathBuf>,
        state: Arc<ProcessErrorState>,
    ) -> ErrorBridge {
        let mut bridge = ErrorBridge::new(display_errors, log_errors, log_file, state);
        let view = Arc::clone(&self.view);
        let slot = Arc::clone(&self.error_message);
        bridge.set_handler(
            move |message: &str, level: ErrorLevel, has_error: bool, display: bool| {
                if !has_error {
                    return Ok(());
                }
                *lock_slot(&slot) = Some(message.to_string());
                if display {
                    if nice_error {
                        view.bind_status(500);
                    } else {
                        return Err(Error::RuntimeTrap {
                            message: message.to_string(),
                            code: level.code(),
                        });
                    }
                }
                Ok(())
            },
            Some(CATCH_ALL),
        );
        bridge
    }

    /// Emit the response onto the transport.
    ///
    /// Body resolution order: captured buffer output wins, then a non-empty
    /// stream verbatim, then the fallback template page. The stream is
    /// rewritten only when the payload was buffered or compressed;
    /// Content-Length reflects the cursor after the rewrite. HEAD requests
    /// emit headers only, with Content-Length already frozen.
    pub fn run(
        &mut self,
        response: &mut Response,
        request: &Request,
        transport: &mut dyn Write,
    ) -> Result<()> {
        self.is_gzipped = false;
        self.is_buffered = false;

        self.view.bind_status(response.status_code().as_u16());

        let mut payload = self.create_body(response)?;

        if request.header_line("Accept-Encoding").contains("gzip") {
            payload = gzip_encode(&payload)?;
            response.set_header("Content-Encoding", "gzip");
            self.is_gzipped = true;
            log::debug!("Compressed response body to {} bytes", payload.len());
        }

        if self.is_buffered || self.is_gzipped {
            let body = response.body_mut();
            body.seek(0);
            body.write(&payload);
        }

        let size = response.body_mut().tell();
        if size > 0 {
            response.set_header("Content-Length", &size.to_string());
            if !response.has_header("Cache-Control") {
                if self.default_cache_ttl == 0 {
                    response.clear_cache();
                } else {
                    response.set_cache(chrono::Utc::now().timestamp(), self.default_cache_ttl);
                }
            }
        }

        response.create_headers();

        let emit_len = if request.method() == "HEAD" {
            let body = response.body_mut();
            body.seek(0);
            body.truncate(0);
            0
        } else {
            size
        };

        response.execute_headers(transport)?;

        if emit_len > 0 {
            let body = response.body_mut();
            body.seek(0);
            let bytes = body.read(emit_len);
            transport.write_all(&bytes)?;
        }
        transport.flush()?;

        Ok(())
    }

    /// Resolve the payload bytes. A captured buffer takes precedence over
    /// the stream's natural content; an empty stream yields a framework
    /// status page. Both set the buffered flag.
    fn create_body(&mut self, response: &mut Response) -> Result<Vec<u8>> {
        if !self.buffer.is_empty() {
            self.is_buffered = true;
            return Ok(std::mem::take(&mut self.buffer).into_bytes());
        }

        let size = response.body().size();
        if size > 0 {
            let body = response.body_mut();
            if body.is_seekable() {
                body.seek(0);
            }
            return Ok(body.read(size));
        }

        self.is_buffered = true;
        let mut page = String::from("\n");
        if self.view.exists(FALLBACK_VIEW) {
            let vars = json!({
                "statusCode": response.status_code().as_u16(),
                "reasonPhrase": response.reason_phrase(),
                "errorMessage": lock_slot(&self.error_message).clone(),
            });
            page.push_str(&self.view.render(FALLBACK_VIEW, &vars)?);
        }
        Ok(page.into_bytes())
    }
}

fn gzip_encode(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

fn lock_slot(slot: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
