use server_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    /// Largest patch accepted over HTTP or the websocket.
    pub(crate) max_patch_bytes: usize,
}
