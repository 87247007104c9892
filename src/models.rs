// Article data models
use serde::{Deserialize, Serialize};

/// One typed node of an article body. Its position in `Article::content`
/// is the block index used for progress tracking and scroll anchoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        content: String,
    },
    Heading {
        content: String,
    },
    Quote {
        content: String,
        #[serde(default)]
        author: Option<String>,
    },
    Image {
        url: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        url: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Model3d {
        url: String,
        #[serde(default)]
        caption: Option<String>,
    },
}

impl ContentBlock {
    pub fn is_text(&self) -> bool {
        matches!(self, ContentBlock::Text { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl Article {
    /// Text fed to both the speech and the summary providers: every `text`
    /// block in order, joined by a single space.
    pub fn narration_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn block_count(&self) -> usize {
        self.content.len()
    }
}

#[cfg(test)]
pub(crate) fn sample_article(id: &str) -> Article {
    Article {
        id: id.to_string(),
        title: format!("Article {}", id),
        subtitle: "A subtitle worth sharing".to_string(),
        category: "TECH".to_string(),
        content: vec![
            ContentBlock::Heading { content: "Intro".to_string() },
            ContentBlock::Text { content: "First paragraph.".to_string() },
            ContentBlock::Image { url: "https://img/1.png".to_string(), caption: None },
            ContentBlock::Text { content: "Second paragraph.".to_string() },
            ContentBlock::Quote { content: "A quote".to_string(), author: None },
            ContentBlock::Text { content: "Closing words.".to_string() },
        ],
    }
}
