//! Chunked and lazy iteration over large result sets.
//!
//! Pages are fetched strictly sequentially: page N+1 is not issued until
//! page N's callback has returned. Each iteration builds its predicate
//! on a clone of the builder, so the caller's builder is never left in a
//! partially mutated state, even if a page or callback fails mid-run.

use std::future::Future;

use crate::client::GenericClient;
use crate::error::{QueryError, QueryResult};
use crate::qb::builder::Builder;
use crate::row::Row;
use crate::value::Value;

/// Signal returned by a chunk callback: keep fetching or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkControl {
    Continue,
    Stop,
}

impl Builder {
    /// Fetch pages of `size` rows with `LIMIT/OFFSET` pagination,
    /// invoking the callback per non-empty page until the callback stops
    /// or a page comes back empty.
    pub async fn chunk<C, F, Fut>(&self, client: &C, size: i64, mut callback: F) -> QueryResult<()>
    where
        C: GenericClient,
        F: FnMut(Vec<Row>) -> Fut,
        Fut: Future<Output = QueryResult<ChunkControl>>,
    {
        if size <= 0 {
            return Err(QueryError::validation(format!(
                "chunk size must be positive, got {size}"
            )));
        }
        let mut offset = 0i64;
        loop {
            let page = self.clone().limit(size).offset(offset).get(client).await?;
            if page.is_empty() {
                return Ok(());
            }
            if callback(page).await? == ChunkControl::Stop {
                return Ok(());
            }
            offset += size;
        }
    }

    /// Fetch ascending pages keyed on the `id` column. Each page adds an
    /// `id > last_seen` predicate instead of an offset, so concurrent
    /// writes cannot shift rows between pages.
    pub async fn chunk_by_id<C, F, Fut>(
        &self,
        client: &C,
        size: i64,
        callback: F,
    ) -> QueryResult<()>
    where
        C: GenericClient,
        F: FnMut(Vec<Row>) -> Fut,
        Fut: Future<Output = QueryResult<ChunkControl>>,
    {
        self.chunk_by_id_driver(client, size, callback, true).await
    }

    /// Descending variant of [`Builder::chunk_by_id`], tracking
    /// `id < last_seen`.
    pub async fn chunk_by_id_desc<C, F, Fut>(
        &self,
        client: &C,
        size: i64,
        callback: F,
    ) -> QueryResult<()>
    where
        C: GenericClient,
        F: FnMut(Vec<Row>) -> Fut,
        Fut: Future<Output = QueryResult<ChunkControl>>,
    {
        self.chunk_by_id_driver(client, size, callback, false).await
    }

    async fn chunk_by_id_driver<C, F, Fut>(
        &self,
        client: &C,
        size: i64,
        mut callback: F,
        ascending: bool,
    ) -> QueryResult<()>
    where
        C: GenericClient,
        F: FnMut(Vec<Row>) -> Fut,
        Fut: Future<Output = QueryResult<ChunkControl>>,
    {
        if size <= 0 {
            return Err(QueryError::validation(format!(
                "chunk size must be positive, got {size}"
            )));
        }
        let mut last_id: Option<Value> = None;
        loop {
            // Cursor pagination owns the ordering; anything the caller
            // accumulated would break the id progression.
            let mut query = self.clone().reorder().limit(size);
            if let Some(cursor) = &last_id {
                query = query.where_operator("id", if ascending { ">" } else { "<" }, cursor.clone());
            }
            query = if ascending {
                query.order_by_asc("id")
            } else {
                query.order_by_desc("id")
            };
            let page = query.get(client).await?;
            let cursor = match page.last() {
                Some(row) => row.get("id")?.clone(),
                None => return Ok(()),
            };
            if callback(page).await? == ChunkControl::Stop {
                return Ok(());
            }
            last_id = Some(cursor);
        }
    }

    /// Invoke a callback per row, fetching `size`-row pages behind the
    /// scenes. Not resumable; re-issue the builder to restart.
    pub async fn lazy<C, F, Fut>(&self, client: &C, size: i64, mut each: F) -> QueryResult<()>
    where
        C: GenericClient,
        F: FnMut(Row) -> Fut,
        Fut: Future<Output = QueryResult<()>>,
    {
        if size <= 0 {
            return Err(QueryError::validation(format!(
                "chunk size must be positive, got {size}"
            )));
        }
        let mut offset = 0i64;
        loop {
            let page = self.clone().limit(size).offset(offset).get(client).await?;
            if page.is_empty() {
                return Ok(());
            }
            for row in page {
                each(row).await?;
            }
            offset += size;
        }
    }

    /// Per-row variant of [`Builder::chunk_by_id`].
    pub async fn lazy_by_id<C, F, Fut>(&self, client: &C, size: i64, each: F) -> QueryResult<()>
    where
        C: GenericClient,
        F: FnMut(Row) -> Fut,
        Fut: Future<Output = QueryResult<()>>,
    {
        self.lazy_by_id_driver(client, size, each, true).await
    }

    /// Per-row variant of [`Builder::chunk_by_id_desc`].
    pub async fn lazy_by_id_desc<C, F, Fut>(
        &self,
        client: &C,
        size: i64,
        each: F,
    ) -> QueryResult<()>
    where
        C: GenericClient,
        F: FnMut(Row) -> Fut,
        Fut: Future<Output = QueryResult<()>>,
    {
        self.lazy_by_id_driver(client, size, each, false).await
    }

    async fn lazy_by_id_driver<C, F, Fut>(
        &self,
        client: &C,
        size: i64,
        mut each: F,
        ascending: bool,
    ) -> QueryResult<()>
    where
        C: GenericClient,
        F: FnMut(Row) -> Fut,
        Fut: Future<Output = QueryResult<()>>,
    {
        if size <= 0 {
            return Err(QueryError::validation(format!(
                "chunk size must be positive, got {size}"
            )));
        }
        let mut last_id: Option<Value> = None;
        loop {
            let mut query = self.clone().reorder().limit(size);
            if let Some(cursor) = &last_id {
                query = query.where_operator("id", if ascending { ">" } else { "<" }, cursor.clone());
            }
            query = if ascending {
                query.order_by_asc("id")
            } else {
                query.order_by_desc("id")
            };
            let page = query.get(client).await?;
            let cursor = match page.last() {
                Some(row) => row.get("id")?.clone(),
                None => return Ok(()),
            };
            for row in page {
                each(row).await?;
            }
            last_id = Some(cursor);
        }
    }
}
