use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::Deserialize;

/// Immutable snapshot of the currently active keys.
///
/// Snapshots are shared by reference count. A new event always produces a
/// new snapshot; a published snapshot never changes afterwards.
pub struct KeySet<K> {
	keys: Arc<FxHashSet<K>>,
}

impl<K> Clone for KeySet<K> {
	fn clone(&self) -> Self {
		Self {
			keys: Arc::clone(&self.keys),
		}
	}
}

impl<K: Eq + Hash> KeySet<K> {
	pub fn empty() -> Self {
		Self {
			keys: Arc::new(FxHashSet::default()),
		}
	}

	pub fn contains(&self, key: &K) -> bool {
		self.keys.contains(key)
	}

	pub fn len(&self) -> usize {
		self.keys.len()
	}

	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &K> {
		self.keys.iter()
	}

	/// Returns true when every key of `self` is also in `other`.
	pub fn is_subset(&self, other: &Self) -> bool {
		self.keys.is_subset(&other.keys)
	}
}

impl<K: Eq + Hash> FromIterator<K> for KeySet<K> {
	fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
		Self {
			keys: Arc::new(iter.into_iter().collect()),
		}
	}
}

impl<K: Eq + Hash> PartialEq for KeySet<K> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.keys, &other.keys) || *self.keys == *other.keys
	}
}

impl<K: Eq + Hash> Eq for KeySet<K> {}

impl<K: fmt::Debug> fmt::Debug for KeySet<K> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_set().entries(self.keys.iter()).finish()
	}
}

/// Discrete input driving a [`ToggleReducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleEvent<K> {
	/// Flip membership of one key.
	Toggle(K),
	/// Force membership of one key, e.g. from a row checkbox.
	Set { key: K, active: bool },
	/// Replace the set with the full key universe.
	SelectAll,
	/// Empty the set.
	ClearAll,
}

/// Starting membership of a [`ToggleReducer`].
///
/// Filter views usually start from `All` ("show everything unless
/// narrowed"), selection views from `None` ("nothing picked yet").
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialKeys<K> {
	All,
	None,
	Only(Vec<K>),
}

/// Stateful fold of [`ToggleEvent`]s into [`KeySet`] snapshots.
#[derive(Debug, Clone)]
pub struct ToggleReducer<K> {
	universe: KeySet<K>,
	current: KeySet<K>,
}

impl<K> ToggleReducer<K>
where
	K: Eq + Hash + Clone,
{
	/// Creates a reducer over a fixed universe with an explicit start policy.
	pub fn new(universe: impl IntoIterator<Item = K>, initial: InitialKeys<K>) -> Self {
		let universe: KeySet<K> = universe.into_iter().collect();
		let current = match initial {
			InitialKeys::All => universe.clone(),
			InitialKeys::None => KeySet::empty(),
			InitialKeys::Only(keys) => keys.into_iter().collect(),
		};
		Self { universe, current }
	}

	pub fn universe(&self) -> &KeySet<K> {
		&self.universe
	}

	pub fn current(&self) -> &KeySet<K> {
		&self.current
	}

	/// Applies one event and returns the resulting snapshot.
	pub fn apply(&mut self, event: ToggleEvent<K>) -> KeySet<K> {
		self.current = reduce(&self.universe, &self.current, event);
		self.current.clone()
	}
}

/// Transition function of the toggle reducer.
pub fn reduce<K>(universe: &KeySet<K>, current: &KeySet<K>, event: ToggleEvent<K>) -> KeySet<K>
where
	K: Eq + Hash + Clone,
{
	match event {
		ToggleEvent::SelectAll => universe.clone(),
		ToggleEvent::ClearAll => KeySet::empty(),
		ToggleEvent::Toggle(key) => {
			let active = !current.contains(&key);
			with_membership(current, key, active)
		}
		ToggleEvent::Set { key, active } => with_membership(current, key, active),
	}
}

fn with_membership<K>(current: &KeySet<K>, key: K, active: bool) -> KeySet<K>
where
	K: Eq + Hash + Clone,
{
	let mut keys: FxHashSet<K> = (*current.keys).clone();
	if active {
		keys.insert(key);
	} else {
		keys.remove(&key);
	}
	KeySet { keys: Arc::new(keys) }
}
