use serde::{Deserialize, Deserializer, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Raw timestamp as delivered by the data source; may be unparseable.
    #[serde(default, deserialize_with = "null_as_default")]
    pub published_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub views: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub news_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avatar_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: u32,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
    pub is_user_comment: bool,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
    pub is_local_comment: bool,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
    pub is_realtime: bool,
}

/// Public part of a user account, as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/comments/add` and input of a locally authored comment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_flags_are_optional() {
        let json = r#"{"id":1,"newsId":2,"author":"Анна","avatarUrl":"","content":"Привіт","createdAt":"2024-03-05T10:00:00Z","likes":3}"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert!(!comment.is_local_comment);
        assert!(!comment.is_realtime);

        let out = serde_json::to_value(&comment).unwrap();
        assert!(out.get("isRealtime").is_none());
        assert_eq!(out["newsId"], 2);
    }

    #[test]
    fn test_article_tolerates_missing_fields() {
        let json = r#"{"id":7,"slug":"s","title":"T"}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert!(article.tags.is_empty());
        assert_eq!(article.views, 0);
        assert_eq!(article.published_at, "");
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let json = r#"{"id":2,"slug":"s","title":null,"tags":null,"views":null,"featured":null,"publishedAt":null}"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.title, "");
        assert!(article.tags.is_empty());
        assert_eq!(article.views, 0);
        assert!(!article.featured);

        let json = r#"{"id":1,"newsId":2,"author":null,"content":"Привіт","likes":null,"isRealtime":null}"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.author, "");
        assert_eq!(comment.likes, 0);
        assert!(!comment.is_realtime);
    }
}
