use std::future::Future;

use cl_store::{Cursor, Filter};
use tracing::debug;

use crate::result::ChunkResult;

/// Process `items` in consecutive slices of at most `chunk_size`, in order,
/// folding the per-slice results.
///
/// A `chunk_size` of zero, or a list that fits in one slice, is handled by a
/// single call. The first failing slice aborts the whole call; earlier
/// slices stay processed.
pub async fn upload_in_chunks<T, R, E, F, Fut>(
    items: Vec<T>,
    chunk_size: usize,
    mut process: F,
) -> Result<R, E>
where
    R: ChunkResult,
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let total = items.len();
    if chunk_size == 0 || total <= chunk_size {
        debug!(total, "upload in a single chunk");
        return process(items).await;
    }

    let mut acc = R::default();
    let mut iter = items.into_iter().peekable();
    let mut index = 0usize;
    while iter.peek().is_some() {
        let chunk: Vec<T> = iter.by_ref().take(chunk_size).collect();
        debug!(index, size = chunk.len(), total, "upload chunk");
        acc = acc.concat(process(chunk).await?);
        index += 1;
    }
    Ok(acc)
}

/// Page through `filter` with `skip = k * chunk_size, limit = chunk_size`
/// until a page comes back short, concatenating pages in order.
///
/// A `chunk_size` of zero issues the unpaged filter once.
pub async fn download_in_chunks<T, E, F, Fut>(
    filter: &Filter,
    chunk_size: usize,
    mut process: F,
) -> Result<Vec<T>, E>
where
    F: FnMut(Filter) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    if chunk_size == 0 {
        return process(filter.clone()).await;
    }

    let mut results = Vec::new();
    let mut skip = 0usize;
    loop {
        let page = process(filter.paged(skip, chunk_size)).await?;
        let size = page.len();
        debug!(skip, size, "download page");
        results.extend(page);
        if size < chunk_size {
            break;
        }
        skip += chunk_size;
    }
    Ok(results)
}

/// Page through `filter` by position rather than offset: each page after
/// the first starts strictly after the cursor of the previous page's last
/// item, as computed by `cursor_of`.
///
/// Rows that move out of the matched set between pages never shift later
/// rows past an offset, so nothing still matching is skipped. A
/// `chunk_size` of zero issues the unpaged filter once.
pub async fn download_after_cursor<T, E, C, F, Fut>(
    filter: &Filter,
    chunk_size: usize,
    cursor_of: C,
    mut process: F,
) -> Result<Vec<T>, E>
where
    C: Fn(&T) -> Cursor,
    F: FnMut(Filter) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    if chunk_size == 0 {
        return process(filter.clone()).await;
    }

    let mut results = Vec::new();
    let mut page_filter = filter.paged(0, chunk_size);
    loop {
        let page = process(page_filter.clone()).await?;
        let size = page.len();
        debug!(size, after = ?page_filter.after, "download page");
        let next = page.last().map(&cursor_of);
        results.extend(page);
        match next {
            Some(cursor) if size >= chunk_size => page_filter = page_filter.after(cursor),
            _ => break,
        }
    }
    Ok(results)
}
