use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use serde::Deserialize;

use crate::toggle::KeySet;

/// How an active key set shapes the derived view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
	/// Keep only items whose key is active.
	#[default]
	Filter,
	/// Keep every item and mark the active ones as selected.
	Select,
}

type KeyFn<T, K> = Arc<dyn Fn(&T) -> Option<&K> + Send + Sync>;
type TextFn<T> = Arc<dyn Fn(&T) -> Option<&str> + Send + Sync>;

/// Describes how items are keyed, searched and matched against a key set.
///
/// In [`ViewMode::Filter`] the key is usually a category (a topic); in
/// [`ViewMode::Select`] it is usually the item's identifier.
pub struct ViewPolicy<T, K> {
	mode: ViewMode,
	key: KeyFn<T, K>,
	text: TextFn<T>,
}

impl<T, K> Clone for ViewPolicy<T, K> {
	fn clone(&self) -> Self {
		Self {
			mode: self.mode,
			key: Arc::clone(&self.key),
			text: Arc::clone(&self.text),
		}
	}
}

impl<T, K> fmt::Debug for ViewPolicy<T, K> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ViewPolicy").field("mode", &self.mode).finish_non_exhaustive()
	}
}

impl<T, K> ViewPolicy<T, K>
where
	K: Eq + Hash,
{
	pub fn new(
		mode: ViewMode,
		key: impl Fn(&T) -> Option<&K> + Send + Sync + 'static,
		text: impl Fn(&T) -> Option<&str> + Send + Sync + 'static,
	) -> Self {
		Self {
			mode,
			key: Arc::new(key),
			text: Arc::new(text),
		}
	}

	/// Policy that removes items whose key is not active.
	pub fn filter(
		key: impl Fn(&T) -> Option<&K> + Send + Sync + 'static,
		text: impl Fn(&T) -> Option<&str> + Send + Sync + 'static,
	) -> Self {
		Self::new(ViewMode::Filter, key, text)
	}

	/// Policy that keeps every item and decorates active ones as selected.
	pub fn select(
		key: impl Fn(&T) -> Option<&K> + Send + Sync + 'static,
		text: impl Fn(&T) -> Option<&str> + Send + Sync + 'static,
	) -> Self {
		Self::new(ViewMode::Select, key, text)
	}

	pub fn mode(&self) -> ViewMode {
		self.mode
	}

	/// Returns true when `item` passes the search token.
	///
	/// `token` is expected to be normalized already. An empty token matches
	/// everything; otherwise items without a searchable field never match.
	pub fn matches_search(&self, item: &T, token: &str) -> bool {
		if token.is_empty() {
			return true;
		}
		(self.text)(item).is_some_and(|text| text.to_lowercase().contains(token))
	}

	/// Returns true when the item's key is in `keys`. Keyless items are never active.
	pub fn is_active(&self, item: &T, keys: &KeySet<K>) -> bool {
		(self.key)(item).is_some_and(|key| keys.contains(key))
	}

	/// Derives the view rows for one consistent set of inputs.
	///
	/// Rows keep the order of `items`.
	pub fn derive(&self, items: &[T], token: &str, keys: &KeySet<K>) -> Vec<ViewRow<T>>
	where
		T: Clone,
	{
		items
			.iter()
			.filter_map(|item| {
				let active = self.is_active(item, keys);
				if self.mode == ViewMode::Filter && !active {
					return None;
				}
				if !self.matches_search(item, token) {
					return None;
				}
				Some(ViewRow {
					item: item.clone(),
					selected: active,
				})
			})
			.collect()
	}
}

/// One item of a derived view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRow<T> {
	pub item: T,
	/// Whether the item's key is in the active set. Always true in filter mode.
	pub selected: bool,
}

/// Immutable result of one recomputation.
#[derive(Debug)]
pub struct DerivedView<T> {
	revision: u64,
	rows: Arc<[ViewRow<T>]>,
}

impl<T> Clone for DerivedView<T> {
	fn clone(&self) -> Self {
		Self {
			revision: self.revision,
			rows: Arc::clone(&self.rows),
		}
	}
}

impl<T> DerivedView<T> {
	pub fn new(revision: u64, rows: Vec<ViewRow<T>>) -> Self {
		Self {
			revision,
			rows: rows.into(),
		}
	}

	/// Monotonic recomputation counter, starting at 1 for the first view.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	pub fn rows(&self) -> &[ViewRow<T>] {
		&self.rows
	}

	pub fn items(&self) -> impl Iterator<Item = &T> {
		self.rows.iter().map(|row| &row.item)
	}

	pub fn selected(&self) -> impl Iterator<Item = &T> {
		self.rows.iter().filter(|row| row.selected).map(|row| &row.item)
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}
}
