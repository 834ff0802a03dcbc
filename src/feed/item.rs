/// One entry of a fetched feed.
///
/// Two items are the same entry iff their `id` matches. The parser fills `id`
/// from the entry's native identifier, falling back to its link (see
/// [`parse_feed`](super::parse_feed)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub link: String,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
        }
    }

    /// Identity used for watermark comparisons.
    pub fn identity(&self) -> &str {
        &self.id
    }
}
