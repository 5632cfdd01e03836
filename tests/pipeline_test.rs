#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;
    use trellis::{
        Controller, ControllerRegistry, Dispatcher, Emitter, ErrorLevel, MatchStatus,
        MiddlewareRegistry, NullView, ProcessErrorState, Request, Response, Result, RouteUrl,
        Target, ViewEngine,
    };

    struct Pages;

    impl ViewEngine for Pages {
        fn exists(&self, name: &str) -> bool {
            name == "index"
        }

        fn render(&self, _name: &str, vars: &Value) -> Result<String> {
            Ok(format!(
                "<h1>{} {}</h1>",
                vars["statusCode"],
                vars["reasonPhrase"].as_str().unwrap_or("")
            ))
        }
    }

    struct Hello;

    #[async_trait]
    impl Controller for Hello {
        async fn invoke(&self, res: &mut Response, req: &Request) -> Result<Option<Response>> {
            res.set_header("Content-Type", "text/plain");
            res.body_mut()
                .write(format!("hello {}", req.path()).as_bytes());
            Ok(None)
        }
    }

    fn ignore_hook(
        _status: MatchStatus,
        _res: &mut Response,
        _req: &Request,
        _url: Option<&RouteUrl>,
    ) -> Result<Option<Response>> {
        Ok(None)
    }

    fn hello_dispatcher(method: &str, target: &str) -> Dispatcher {
        let controllers = Arc::new(ControllerRegistry::new());
        controllers.register("hello", || Arc::new(Hello));
        let mut dispatcher = Dispatcher::new(
            Response::ok(),
            Request::new(method, target),
            controllers,
            Arc::new(MiddlewareRegistry::new()),
        );
        dispatcher
            .map(&["GET", "HEAD"], "/greet", Target::controller("hello"))
            .unwrap();
        dispatcher
    }

    #[tokio::test]
    async fn test_dispatch_then_emit() {
        let mut dispatcher = hello_dispatcher("GET", "/greet");
        let mut response = dispatcher.dispatch(ignore_hook).await.unwrap();

        let mut emitter = Emitter::new(Arc::new(NullView));
        let mut wire = Vec::new();
        emitter
            .run(&mut response, dispatcher.request(), &mut wire)
            .unwrap();

        let raw = String::from_utf8(wire).unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Content-Type: text/plain\r\n"));
        assert!(raw.ends_with("hello /greet"));
    }

    #[tokio::test]
    async fn test_head_request_through_the_pipeline() {
        let mut dispatcher = hello_dispatcher("HEAD", "/greet");
        let mut response = dispatcher.dispatch(ignore_hook).await.unwrap();

        let mut emitter = Emitter::new(Arc::new(NullView));
        let mut wire = Vec::new();
        emitter
            .run(&mut response, dispatcher.request(), &mut wire)
            .unwrap();

        let raw = String::from_utf8(wire).unwrap();
        assert!(raw.contains("Content-Length: 12\r\n"));
        assert!(raw.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_not_found_renders_fallback_page() {
        let mut dispatcher = hello_dispatcher("GET", "/nowhere");
        let mut response = dispatcher
            .dispatch(|status, _res, _req, _url| {
                assert_eq!(status, MatchStatus::NotFound);
                Ok(Some(Response::new(hyper::StatusCode::NOT_FOUND)))
            })
            .await
            .unwrap();

        let mut emitter = Emitter::new(Arc::new(Pages));
        let mut wire = Vec::new();
        emitter
            .run(&mut response, dispatcher.request(), &mut wire)
            .unwrap();

        let raw = String::from_utf8(wire).unwrap();
        assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(raw.ends_with("<h1>404 Not Found</h1>"));
    }

    #[tokio::test]
    async fn test_trapped_fault_surfaces_on_the_fallback_page() {
        struct EchoError;

        impl ViewEngine for EchoError {
            fn exists(&self, name: &str) -> bool {
                name == "index"
            }

            fn render(&self, _name: &str, vars: &Value) -> Result<String> {
                Ok(vars["errorMessage"]
                    .as_str()
                    .unwrap_or("no error")
                    .to_string())
            }
        }

        let mut emitter = Emitter::new(Arc::new(EchoError));
        let state = Arc::new(ProcessErrorState::with_fail_fast(Box::new(|| {})));
        let bridge = emitter.error_handler(true, true, false, None, state);
        bridge
            .report(ErrorLevel::Warning, "template blew up", "home.rs", 12)
            .unwrap();

        let mut response = Response::new(hyper::StatusCode::INTERNAL_SERVER_ERROR);
        let request = Request::new("GET", "/broken");
        let mut wire = Vec::new();
        emitter.run(&mut response, &request, &mut wire).unwrap();

        let raw = String::from_utf8(wire).unwrap();
        assert!(raw.ends_with("template blew up in home.rs on line 12"));
    }
}
