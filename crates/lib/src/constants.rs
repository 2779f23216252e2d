//! Constants used throughout the Formstack library.

/// Default maximum number of drawers stacked above the root form.
pub const DEFAULT_MAX_DRAWER_DEPTH: usize = 8;

/// Locale used when a session does not request one.
pub const DEFAULT_LOCALE: &str = "en";

/// Label template used when a localized schema label lacks the requested locale.
///
/// `{name}` is replaced by the field name and `{locale}` by the requested locale.
pub const MISSING_TRANSLATION_TEMPLATE: &str = "No {name} {locale}";

/// Number of digits row numbers are padded to in default row labels.
pub const DEFAULT_ROW_LABEL_DIGITS: usize = 2;

/// Default row label used for array rows without a singular label.
pub const DEFAULT_ROW_NOUN: &str = "Row";

/// Reserved key carrying a row's stable id in JSON payloads.
pub const ROW_ID_KEY: &str = "id";

/// Reserved key carrying a block row's variant slug in JSON payloads.
pub const BLOCK_TYPE_KEY: &str = "blockType";

/// Key prefix of unnamed tabs fields, followed by their position at the level.
pub const UNNAMED_TABS_PREFIX: &str = "_tabs-";

/// Number of documents returned per page by the in-memory backend.
pub const DEFAULT_PAGE_SIZE: usize = 10;
