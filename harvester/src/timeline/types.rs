use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sort order of a result batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    CreatedAt,
    RetweetCount,
    FavouritesCount,
}

impl Order {
    pub fn as_param(&self) -> &'static str {
        match self {
            Order::CreatedAt => "created_at",
            Order::RetweetCount => "retweet_count",
            Order::FavouritesCount => "favourites_count",
        }
    }
}

/// One result item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, rename = "id_str")]
    pub id: String,

    #[serde(default)]
    pub screen_name: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Mentioned user names, without the leading `@`.
    #[serde(default)]
    pub mentions: Vec<String>,

    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// A batch of result items, optionally tagged with the query that produced it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub order: Order,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, rename = "statuses")]
    pub messages: Vec<Message>,
}

impl Timeline {
    pub fn empty(order: Order) -> Self {
        Self {
            order,
            query: None,
            messages: Vec::new(),
        }
    }

    pub fn new(order: Order, messages: Vec<Message>) -> Self {
        Self {
            order,
            query: None,
            messages,
        }
    }

    /// Tags the batch with the query it answers.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
