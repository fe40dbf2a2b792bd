use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::result_set::ResultSet;
use super::row::{CustomDbRow, index_columns};
use crate::error::PartiqlDbError;
use crate::types::{AttributeValue, Item, RowValues};

/// One page of records returned by a [`PageFetcher`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub next_token: Option<String>,
}

impl Page {
    #[must_use]
    pub fn new(items: Vec<Item>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Source of pages for a [`Cursor`].
///
/// `token` is `None` for the first page and the previous page's continuation token after that.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, token: Option<String>) -> Result<Page, PartiqlDbError>;
}

/// Custom decoding for a destination slot.
pub trait Scanner: Send {
    /// Receive the decoded value of the slot's column; `RowValues::Null` when the record lacks
    /// the attribute.
    ///
    /// # Errors
    /// Whatever the implementation reports; [`Cursor::next`] returns it unchanged.
    fn scan(&mut self, value: RowValues) -> Result<(), PartiqlDbError>;
}

/// Destination for one column of [`Cursor::next`].
pub enum Slot<'a> {
    Value(&'a mut RowValues),
    Scanner(&'a mut dyn Scanner),
}

impl Slot<'_> {
    fn fill(&mut self, value: RowValues) -> Result<(), PartiqlDbError> {
        match self {
            Slot::Value(dest) => {
                **dest = value;
                Ok(())
            }
            Slot::Scanner(scanner) => scanner.scan(value),
        }
    }
}

#[derive(Clone)]
struct RowLayout {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl RowLayout {
    fn new(names: Vec<String>) -> Self {
        let index = Arc::new(index_columns(&names));
        Self {
            names: Arc::new(names),
            index,
        }
    }
}

/// Paginated, forward-only reader over backend records.
///
/// The cursor owns the current page and its read position. When the page runs out,
/// [`advance_page`](Self::advance_page) asks the fetcher for the next one using the stored
/// continuation token. Once no token remains the cursor reports end-of-data without calling the
/// fetcher again.
pub struct Cursor {
    columns: Vec<String>,
    next_token: Option<String>,
    fetcher: Arc<dyn PageFetcher>,
    page: Vec<Item>,
    position: usize,
    cancel: CancellationToken,
    layout: Option<RowLayout>,
    closed: bool,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("columns", &self.columns)
            .field("next_token", &self.next_token)
            .field("page_len", &self.page.len())
            .field("position", &self.position)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Cursor {
    /// Build a cursor over an already fetched first page.
    ///
    /// An empty `columns` list means every attribute of each record, ordered by name.
    #[must_use]
    pub fn new(
        columns: Vec<String>,
        first_page: Page,
        fetcher: Arc<dyn PageFetcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            columns,
            next_token: first_page.next_token,
            fetcher,
            page: first_page.items,
            position: 0,
            cancel,
            layout: None,
            closed: false,
        }
    }

    /// Fetch the first page eagerly and build a cursor over it.
    ///
    /// # Errors
    /// Returns the fetcher's error, or `PartiqlDbError::Cancelled` if `cancel` fires first.
    pub async fn open(
        columns: Vec<String>,
        fetcher: Arc<dyn PageFetcher>,
        cancel: CancellationToken,
    ) -> Result<Self, PartiqlDbError> {
        let first_page = fetch_with_cancel(fetcher.as_ref(), None, &cancel).await?;
        Ok(Self::new(columns, first_page, fetcher, cancel))
    }

    /// Requested columns; empty when every attribute was requested.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// True while the current page still has unread records.
    #[must_use]
    pub fn has_unread(&self) -> bool {
        self.position < self.page.len()
    }

    /// True when the backend reported more pages.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.next_token.is_some()
    }

    /// Token that aborts this cursor's page fetches when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Move to the next page once the current one is exhausted.
    ///
    /// A no-op returning `Ok(true)` while the current page has unread records. Otherwise fetches
    /// exactly one page with the stored token and makes it current. Returns `Ok(false)` at
    /// end-of-data: no token left, or the fetched page is empty and carries no token. An empty
    /// page that still carries a token returns `Ok(true)` with nothing to read; call again to
    /// move past it. After end-of-data every call returns `Ok(false)` without touching the
    /// fetcher.
    ///
    /// # Errors
    /// Returns the fetcher's error or `PartiqlDbError::Cancelled`; the token is kept so the
    /// call may be retried.
    pub async fn advance_page(&mut self) -> Result<bool, PartiqlDbError> {
        if self.closed {
            return Ok(false);
        }
        if self.has_unread() {
            return Ok(true);
        }
        let Some(token) = self.next_token.clone() else {
            return Ok(false);
        };
        let page = fetch_with_cancel(self.fetcher.as_ref(), Some(token), &self.cancel).await?;
        debug!(
            records = page.items.len(),
            more = page.next_token.is_some(),
            "fetched page"
        );
        let exhausted = page.items.is_empty() && page.next_token.is_none();
        self.page = page.items;
        self.position = 0;
        self.next_token = page.next_token;
        Ok(!exhausted)
    }

    /// Read the current record into `dest` in column order and move past it.
    ///
    /// Returns `Ok(false)` once the current page is exhausted; call
    /// [`advance_page`](Self::advance_page) to continue. Slots beyond the column count are left
    /// untouched.
    ///
    /// # Errors
    /// Returns the first error reported by a [`Scanner`] slot.
    pub fn next(&mut self, dest: &mut [Slot<'_>]) -> Result<bool, PartiqlDbError> {
        let Some(record) = self.page.get(self.position) else {
            return Ok(false);
        };
        self.position += 1;
        let columns = record_columns(&self.columns, record);
        for (slot, column) in dest.iter_mut().zip(columns.iter()) {
            slot.fill(decode(record, column))?;
        }
        Ok(true)
    }

    /// Read the next record as a row, fetching pages on demand and stepping over empty ones.
    ///
    /// # Errors
    /// Returns the fetcher's error or `PartiqlDbError::Cancelled`.
    pub async fn next_row(&mut self) -> Result<Option<CustomDbRow>, PartiqlDbError> {
        while !self.has_unread() {
            if !self.advance_page().await? {
                return Ok(None);
            }
        }
        Ok(self.read_row())
    }

    /// Drain every remaining record into a [`ResultSet`].
    ///
    /// # Errors
    /// Returns the first fetch error.
    pub async fn collect(mut self) -> Result<ResultSet, PartiqlDbError> {
        let mut result_set = ResultSet::with_capacity(self.page.len());
        while let Some(row) = self.next_row().await? {
            result_set.add_row(row);
        }
        self.close();
        Ok(result_set)
    }

    /// Cancel any in-flight fetch and drop the buffered page. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.cancel.cancel();
        self.closed = true;
        self.page.clear();
        self.position = 0;
        self.next_token = None;
    }

    pub(crate) fn read_row(&mut self) -> Option<CustomDbRow> {
        let record = self.page.get(self.position)?;
        self.position += 1;
        let names = record_columns(&self.columns, record);
        let reusable = self
            .layout
            .as_ref()
            .filter(|layout| layout.names.as_slice() == names.as_ref())
            .cloned();
        let layout = match reusable {
            Some(layout) => layout,
            None => {
                let layout = RowLayout::new(names.into_owned());
                self.layout = Some(layout.clone());
                layout
            }
        };
        let values = layout
            .names
            .iter()
            .map(|column| decode(record, column))
            .collect();
        Some(CustomDbRow::with_cache(layout.names, values, layout.index))
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}

async fn fetch_with_cancel(
    fetcher: &dyn PageFetcher,
    token: Option<String>,
    cancel: &CancellationToken,
) -> Result<Page, PartiqlDbError> {
    tokio::select! {
        () = cancel.cancelled() => Err(PartiqlDbError::Cancelled),
        page = fetcher.fetch(token) => page,
    }
}

/// Columns to materialize for `record`: the requested list, or the record's own attribute
/// names sorted when every attribute was requested.
fn record_columns<'a>(requested: &'a [String], record: &Item) -> Cow<'a, [String]> {
    if requested.is_empty() {
        let mut names: Vec<String> = record.keys().cloned().collect();
        names.sort_unstable();
        Cow::Owned(names)
    } else {
        Cow::Borrowed(requested)
    }
}

fn decode(record: &Item, column: &str) -> RowValues {
    record
        .get(column)
        .map_or(RowValues::Null, AttributeValue::to_row_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Pages {
        pages: Mutex<Vec<Page>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for Pages {
        async fn fetch(&self, _token: Option<String>) -> Result<Page, PartiqlDbError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut pages = self.pages.lock().unwrap();
            Ok(if pages.is_empty() {
                Page::empty()
            } else {
                pages.remove(0)
            })
        }
    }

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[derive(Default)]
    struct Upper(String);

    impl Scanner for Upper {
        fn scan(&mut self, value: RowValues) -> Result<(), PartiqlDbError> {
            self.0 = value.as_text().unwrap_or_default().to_uppercase();
            Ok(())
        }
    }

    #[tokio::test]
    async fn star_columns_are_sorted_and_scanners_decode() {
        let first = Page::new(
            vec![item(&[
                ("name", AttributeValue::S("ada".into())),
                ("id", AttributeValue::N("1".into())),
            ])],
            None,
        );
        let fetcher = Arc::new(Pages {
            pages: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let mut cursor = Cursor::new(Vec::new(), first, fetcher.clone(), CancellationToken::new());

        let mut id = RowValues::Null;
        let mut name = Upper::default();
        let mut dest = [Slot::Value(&mut id), Slot::Scanner(&mut name)];
        assert!(cursor.next(&mut dest).unwrap());
        assert!(!cursor.next(&mut dest).unwrap());
        drop(dest);
        assert_eq!(id, RowValues::Int(1));
        assert_eq!(name.0, "ADA");

        assert!(!cursor.advance_page().await.unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_attributes_read_as_null() {
        let first = Page::new(vec![item(&[("id", AttributeValue::N("7".into()))])], None);
        let fetcher = Arc::new(Pages {
            pages: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let mut cursor = Cursor::new(
            vec!["id".into(), "email".into()],
            first,
            fetcher,
            CancellationToken::new(),
        );
        let row = cursor.next_row().await.unwrap().unwrap();
        assert_eq!(row.get("id"), Some(&RowValues::Int(7)));
        assert_eq!(row.get("email"), Some(&RowValues::Null));
    }

    #[tokio::test]
    async fn each_advance_fetches_one_page() {
        let fetcher = Arc::new(Pages {
            pages: Mutex::new(vec![
                Page::new(Vec::new(), Some("t2".into())),
                Page::new(vec![item(&[("id", AttributeValue::N("2".into()))])], None),
            ]),
            calls: AtomicUsize::new(0),
        });
        let mut cursor = Cursor::new(
            vec!["id".into()],
            Page::new(Vec::new(), Some("t1".into())),
            fetcher.clone(),
            CancellationToken::new(),
        );
        assert!(cursor.advance_page().await.unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(!cursor.has_unread());
        assert!(cursor.has_next_page());

        assert!(cursor.advance_page().await.unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(cursor.has_unread());
        assert!(!cursor.has_next_page());
    }

    #[tokio::test]
    async fn next_row_steps_over_empty_pages() {
        let fetcher = Arc::new(Pages {
            pages: Mutex::new(vec![
                Page::new(Vec::new(), Some("t2".into())),
                Page::new(Vec::new(), Some("t3".into())),
                Page::new(vec![item(&[("id", AttributeValue::N("3".into()))])], None),
            ]),
            calls: AtomicUsize::new(0),
        });
        let mut cursor = Cursor::new(
            vec!["id".into()],
            Page::new(Vec::new(), Some("t1".into())),
            fetcher.clone(),
            CancellationToken::new(),
        );
        let row = cursor.next_row().await.unwrap().unwrap();
        assert_eq!(row.get("id"), Some(&RowValues::Int(3)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert!(cursor.next_row().await.unwrap().is_none());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn closed_cursor_reports_end_of_data() {
        let fetcher = Arc::new(Pages {
            pages: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        });
        let first = Page::new(vec![item(&[("id", AttributeValue::N("1".into()))])], Some("t".into()));
        let mut cursor = Cursor::new(Vec::new(), first, fetcher.clone(), CancellationToken::new());
        let token = cursor.cancellation_token();
        cursor.close();
        cursor.close();
        assert!(token.is_cancelled());
        assert!(!cursor.advance_page().await.unwrap());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }
}
