#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use trellis::{
        ControllerRegistry, Dispatcher, MatchStatus, MiddlewareRegistry, Request, Response,
        Result, RouteUrl, Target,
    };

    fn noop<'a>(
        _res: &'a mut Response,
        _req: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Response>>> + Send + 'a>> {
        Box::pin(async { Ok(None) })
    }

    fn ignore_hook(
        _status: MatchStatus,
        _res: &mut Response,
        _req: &Request,
        _url: Option<&RouteUrl>,
    ) -> Result<Option<Response>> {
        Ok(None)
    }

    fn dispatcher(target: &str) -> Dispatcher {
        Dispatcher::new(
            Response::ok(),
            Request::new("GET", target),
            Arc::new(ControllerRegistry::new()),
            Arc::new(MiddlewareRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_cache_file_is_written_on_first_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("routes.json");

        let mut d = dispatcher("/a");
        d.get("/a", Target::callable(noop)).unwrap();
        d.get("/b/{id}", Target::callable(noop)).unwrap();
        d.set_router_cache_file(cache_path.to_str().unwrap(), true)
            .unwrap();
        d.dispatch(ignore_hook).await.unwrap();

        let raw = std::fs::read_to_string(&cache_path).unwrap();
        assert!(raw.contains("/b/{id}"));
    }

    #[tokio::test]
    async fn test_matching_cache_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("routes.json");
        let cache_file = cache_path.to_str().unwrap().to_string();

        let mut first = dispatcher("/a");
        first.get("/a", Target::callable(noop)).unwrap();
        first.set_router_cache_file(&cache_file, true).unwrap();
        first.dispatch(ignore_hook).await.unwrap();
        let written = std::fs::metadata(&cache_path).unwrap().modified().unwrap();

        let mut second = dispatcher("/a");
        second.get("/a", Target::callable(noop)).unwrap();
        second.set_router_cache_file(&cache_file, true).unwrap();
        let mut statuses = Vec::new();
        second
            .dispatch(|status, _res, _req, _url| {
                statuses.push(status);
                Ok(None)
            })
            .await
            .unwrap();

        assert_eq!(statuses, [MatchStatus::Found]);
        // Unchanged route set leaves the cache file untouched
        let reread = std::fs::metadata(&cache_path).unwrap().modified().unwrap();
        assert_eq!(written, reread);
    }

    #[tokio::test]
    async fn test_stale_cache_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("routes.json");
        let cache_file = cache_path.to_str().unwrap().to_string();

        let mut first = dispatcher("/old");
        first.get("/old", Target::callable(noop)).unwrap();
        first.set_router_cache_file(&cache_file, true).unwrap();
        first.dispatch(ignore_hook).await.unwrap();

        // Same file, different routes: the stale cache must not shadow them
        let mut second = dispatcher("/new");
        second.get("/new", Target::callable(noop)).unwrap();
        second.set_router_cache_file(&cache_file, true).unwrap();
        let mut statuses = Vec::new();
        second
            .dispatch(|status, _res, _req, _url| {
                statuses.push(status);
                Ok(None)
            })
            .await
            .unwrap();

        assert_eq!(statuses, [MatchStatus::Found]);
        let raw = std::fs::read_to_string(&cache_path).unwrap();
        assert!(raw.contains("/new"));
        assert!(!raw.contains("/old"));
    }

    #[tokio::test]
    async fn test_corrupt_cache_falls_back_to_fresh_compile() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("routes.json");
        std::fs::write(&cache_path, "not json at all").unwrap();

        let mut d = dispatcher("/a");
        d.get("/a", Target::callable(noop)).unwrap();
        d.set_router_cache_file(cache_path.to_str().unwrap(), true)
            .unwrap();
        let mut statuses = Vec::new();
        d.dispatch(|status, _res, _req, _url| {
            statuses.push(status);
            Ok(None)
        })
        .await
        .unwrap();
        assert_eq!(statuses, [MatchStatus::Found]);
    }

    #[test]
    fn test_missing_cache_directory_is_rejected() {
        let mut d = dispatcher("/a");
        let err = d
            .set_router_cache_file("/definitely/not/a/dir/routes.json", true)
            .unwrap_err();
        assert!(matches!(err, trellis::Error::Configuration(_)));
    }

    #[test]
    fn test_disabled_cache_skips_directory_check() {
        let mut d = dispatcher("/a");
        d.set_router_cache_file("/definitely/not/a/dir/routes.json", false)
            .unwrap();
    }
}
