pub mod collection;
pub mod event;
pub mod item;
pub mod items_field;
pub mod organization;
pub mod person;
pub mod persons_field;
pub mod search_history;

pub use collection::{Collection, CollectionConfig};
pub use event::{Event, SimpleEvent};
pub use item::{Item, SimpleItem};
pub use items_field::ItemsField;
pub use organization::Organization;
pub use person::{Person, SimplePerson};
pub use search_history::SearchHistory;

use rand::Rng;

/// Random namespace-wide id, matching the store's bigint keys.
pub fn ns_id() -> i64 {
    rand::rng().random_range(0..1_000_000_000_000)
}
