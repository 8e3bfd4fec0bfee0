use axum::{Extension, Router};

use crate::models::item::Category;
use crate::AppState;

pub mod auth;
pub mod items;
pub mod reports;

pub fn api() -> Router<AppState> {
    let mut router = Router::new()
        .merge(auth::router())
        .merge(reports::router());
    for category in Category::ALL {
        router = router.nest(
            &format!("/{}", category.collection()),
            items::router().layer(Extension(category)),
        );
    }
    router
}
