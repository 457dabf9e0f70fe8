use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Post {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub poster: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Profile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub account_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub join_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub followers: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub following: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prism: bool,
}

impl Profile {
    pub fn display_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_empty(&self.display_name).unwrap_or(fallback)
    }

    pub fn account_name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_empty(&self.account_name).unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UniqueReply {
    #[serde(default, deserialize_with = "null_as_default")]
    pub post_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub poster: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default)]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenericReplyGroup {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub posters: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<String>,
}

impl GenericReplyGroup {
    pub fn matches(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|tag| tags.contains(tag))
    }
}

/// Render-ready post with its resolved author and comments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub id: usize,
    pub name: String,
    pub poster: String,
    pub username: String,
    pub handle: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub avatar: String,
    pub comments: Vec<Comment>,
    pub priority: i64,
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    pub poster: String,
    pub username: String,
    pub handle: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub avatar: String,
    pub priority: i64,
}

/// Fixture files write `null` where a field has no value; read it as the default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn non_empty(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_parses_pascal_case_fields() {
        let post: Post = serde_json::from_str(
            r#"{"Name":"FantasticDay","Poster":"Fanny","Body":"Hi","Priority":2,"Tags":["sun"]}"#,
        )
        .unwrap();
        assert_eq!(post.name, "FantasticDay");
        assert_eq!(post.priority, Some(2));
        assert_eq!(post.tags, vec!["sun".to_string()]);
        assert!(post.image.is_none());
    }

    #[test]
    fn null_fields_read_as_defaults() {
        let post: Post = serde_json::from_str(
            r#"{"Name":"A","Poster":null,"Body":null,"Tags":null,"Priority":null}"#,
        )
        .unwrap();
        assert_eq!(post.name, "A");
        assert!(post.poster.is_empty());
        assert!(post.tags.is_empty());
        assert_eq!(post.priority, None);

        let profile: Profile = serde_json::from_str(
            r#"{"DisplayName":"Fanny","AccountName":"fanny01","Location":null,"Followers":null,"Following":null,"Prism":null}"#,
        )
        .unwrap();
        assert_eq!(profile.account_name, "fanny01");
        assert_eq!(profile.followers, 0);
        assert!(!profile.prism);

        let group: GenericReplyGroup =
            serde_json::from_str(r#"{"Tags":["sun"],"Posters":null,"Comments":null}"#).unwrap();
        assert_eq!(group.tags, vec!["sun".to_string()]);
        assert!(group.comments.is_empty());

        let reply: UniqueReply =
            serde_json::from_str(r#"{"PostName":"A","Poster":"Hypnos","Body":null}"#).unwrap();
        assert!(reply.body.is_empty());
    }

    #[test]
    fn profile_falls_back_on_blank_names() {
        let profile = Profile {
            display_name: "  ".into(),
            account_name: "fanny01".into(),
            ..Profile::default()
        };
        assert_eq!(profile.display_name_or("Fanny"), "Fanny");
        assert_eq!(profile.account_name_or("Fanny"), "fanny01");
    }

    #[test]
    fn generic_group_requires_tag_overlap() {
        let group = GenericReplyGroup {
            tags: vec!["jungle".into(), "arsenal".into()],
            posters: vec![],
            comments: vec![],
        };
        assert!(group.matches(&["arsenal".into()]));
        assert!(!group.matches(&["Arsenal".into()]));
        assert!(!group.matches(&[]));
    }
}
