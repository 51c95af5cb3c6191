/// Router Module Index
///
/// Splits the application's routing into its two facades. Both routers share
/// the same `AppState`, and therefore the same repository and media storage;
/// only the authentication transport and the response format differ between
/// them.

/// The JSON API under `/api`, authenticated by bearer token.
pub mod api;

/// The server-rendered HTML pages, authenticated by session cookie.
pub mod web;
