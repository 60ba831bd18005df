//! Relationships Module - Relation kinds, key mapping and match dictionaries

pub mod dictionary;
pub mod keys;
pub mod relation;

pub mod belongs_to;
pub mod belongs_to_many;
pub mod has_many;
pub mod has_many_by;
pub mod has_many_through;
pub mod has_one;
pub mod morph_many;
pub mod morph_one;
pub mod morph_to;


// Re-export main types
pub use dictionary::{map_to_dictionary, Dictionary};
pub use keys::{DictionaryKey, KeyPairs};
pub use relation::{Relation, RelationKind, PIVOT};

pub use belongs_to::BelongsTo;
pub use belongs_to_many::BelongsToMany;
pub use has_many::HasMany;
pub use has_many_by::HasManyBy;
pub use has_many_through::HasManyThrough;
pub use has_one::HasOne;
pub use morph_many::MorphMany;
pub use morph_one::MorphOne;
pub use morph_to::MorphTo;
