//! Response envelope: `{"data": ...}` for single items, `{"data": [...], "meta": {...}}` for lists.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T, M = MetaCount> {
    pub data: Vec<T>,
    pub meta: M,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// Meta for paginated listings; `count` is the size of this page.
#[derive(Serialize)]
pub struct MetaPage {
    pub count: u64,
    pub limit: u32,
    pub offset: u32,
}

/// 201 with the created item.
pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data }))
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (StatusCode::OK, Json(SuccessMany { data, meta: MetaCount { count } }))
}

pub fn success_page<T: Serialize>(data: Vec<T>, (limit, offset): (u32, u32)) -> (StatusCode, Json<SuccessMany<T, MetaPage>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaPage { count, limit, offset },
        }),
    )
}
