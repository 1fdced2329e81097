//! Editorial content: neighborhoods, blog posts, footer, page sections and
//! static pages.

use crate::db::models::{FooterContent, Neighborhood, Page, PageContent, Post, StaticPage};
use crate::db::operations::{paginate, DbOperations};
use crate::error::AppError;
use chrono::Utc;
use serde::Deserialize;

/// URL slug from free text: lowercase ASCII, Finnish/Swedish letters folded,
/// everything else collapsed into single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.trim().chars().flat_map(char::to_lowercase) {
        let mapped = match c {
            'ä' | 'å' | 'á' | 'à' => Some('a'),
            'ö' | 'ó' | 'ø' => Some('o'),
            'é' | 'è' => Some('e'),
            'ü' => Some('u'),
            c if c.is_ascii_alphanumeric() => Some(c),
            _ => None,
        };
        match mapped {
            Some(c) => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c);
            }
            None => pending_dash = true,
        }
    }
    slug
}

fn resolve_slug(slug: Option<&str>, fallback: &str) -> Result<String, AppError> {
    let slug = slugify(slug.filter(|s| !s.trim().is_empty()).unwrap_or(fallback));
    if slug.is_empty() {
        return Err(AppError::validation("could not derive a slug; provide one explicitly"));
    }
    Ok(slug)
}

fn require(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} is required", name)));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeighborhoodInput {
    pub name: String,
    pub slug: Option<String>,
    pub city: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

impl NeighborhoodInput {
    /// Validates and returns the slug to store.
    pub fn validate(&self) -> Result<String, AppError> {
        require("name", &self.name)?;
        require("city", &self.city)?;
        if self.latitude.is_some() != self.longitude.is_some() {
            return Err(AppError::validation("latitude and longitude must be given together"));
        }
        resolve_slug(self.slug.as_deref(), &self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

impl PostInput {
    pub fn validate(&self) -> Result<String, AppError> {
        require("title", &self.title)?;
        require("content", &self.content)?;
        resolve_slug(self.slug.as_deref(), &self.title)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub include_drafts: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FooterInput {
    pub title: Option<String>,
    pub content: serde_json::Value,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticPageInput {
    pub slug: Option<String>,
    pub title: String,
    pub content: String,
    pub meta_description: Option<String>,
    #[serde(default = "default_true")]
    pub published: bool,
}

impl StaticPageInput {
    pub fn validate(&self) -> Result<String, AppError> {
        require("title", &self.title)?;
        require("content", &self.content)?;
        resolve_slug(self.slug.as_deref(), &self.title)
    }
}

fn default_true() -> bool {
    true
}

impl DbOperations {
    // Neighborhoods

    pub async fn list_neighborhoods(&self, city: Option<&str>) -> Result<Vec<Neighborhood>, AppError> {
        let rows = sqlx::query_as::<_, Neighborhood>(
            r#"
            SELECT * FROM neighborhoods
            WHERE ($1::TEXT IS NULL OR LOWER(city) = LOWER($1))
            ORDER BY city, name
            "#,
        )
        .bind(city)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Look up by numeric id or by slug.
    pub async fn find_neighborhood(&self, id_or_slug: &str) -> Result<Option<Neighborhood>, AppError> {
        let row = match id_or_slug.parse::<i32>() {
            Ok(id) => {
                sqlx::query_as::<_, Neighborhood>("SELECT * FROM neighborhoods WHERE id = $1")
                    .bind(id)
                    .fetch_optional(self.pool())
                    .await?
            }
            Err(_) => {
                sqlx::query_as::<_, Neighborhood>("SELECT * FROM neighborhoods WHERE slug = $1")
                    .bind(id_or_slug)
                    .fetch_optional(self.pool())
                    .await?
            }
        };

        Ok(row)
    }

    pub async fn create_neighborhood(&self, input: &NeighborhoodInput, slug: &str) -> Result<Neighborhood, AppError> {
        let row = sqlx::query_as::<_, Neighborhood>(
            r#"
            INSERT INTO neighborhoods (name, slug, city, description, image_url, latitude, longitude, highlights)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.city.trim())
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&input.highlights)
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn update_neighborhood(&self, id: i32, input: &NeighborhoodInput, slug: &str) -> Result<Neighborhood, AppError> {
        let row = sqlx::query_as::<_, Neighborhood>(
            r#"
            UPDATE neighborhoods SET
                name = $1, slug = $2, city = $3, description = $4, image_url = $5,
                latitude = $6, longitude = $7, highlights = $8, updated_at = $9
            WHERE id = $10
            RETURNING *
            "#,
        )
        .bind(input.name.trim())
        .bind(slug)
        .bind(input.city.trim())
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&input.highlights)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn delete_neighborhood(&self, id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM neighborhoods WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Posts

    pub async fn list_posts(&self, query: &PostQuery, include_drafts: bool) -> Result<Page<Post>, AppError> {
        let (page, limit, offset) = paginate(query.page, query.limit, 10);

        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE ($1 OR published = TRUE)
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY COALESCE(published_at, created_at) DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(include_drafts)
        .bind(&query.category)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool());

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM posts
            WHERE ($1 OR published = TRUE)
              AND ($2::TEXT IS NULL OR category = $2)
            "#,
        )
        .bind(include_drafts)
        .bind(&query.category)
        .fetch_one(self.pool());

        let (posts, total) = futures::try_join!(rows, count)?;
        Ok(Page::new(posts, total, page, limit))
    }

    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool())
            .await?;

        Ok(post)
    }

    pub async fn create_post(&self, input: &PostInput, slug: &str, author_id: i32) -> Result<Post, AppError> {
        let now = Utc::now();
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (title, slug, excerpt, content, cover_image, category, tags, author_id, published, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(input.title.trim())
        .bind(slug)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.cover_image)
        .bind(&input.category)
        .bind(&input.tags)
        .bind(author_id)
        .bind(input.published)
        .bind(input.published.then_some(now))
        .fetch_one(self.pool())
        .await?;

        Ok(post)
    }

    /// Replaces a post. `published_at` is stamped the first time it is published.
    pub async fn update_post(&self, id: i32, input: &PostInput, slug: &str) -> Result<Post, AppError> {
        let now = Utc::now();
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts SET
                title = $1, slug = $2, excerpt = $3, content = $4, cover_image = $5,
                category = $6, tags = $7, published = $8,
                published_at = CASE WHEN $8 THEN COALESCE(published_at, $9) ELSE published_at END,
                updated_at = $9
            WHERE id = $10
            RETURNING *
            "#,
        )
        .bind(input.title.trim())
        .bind(slug)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.cover_image)
        .bind(&input.category)
        .bind(&input.tags)
        .bind(input.published)
        .bind(now)
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        Ok(post)
    }

    pub async fn delete_post(&self, id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Footer

    pub async fn list_footer(&self, include_inactive: bool) -> Result<Vec<FooterContent>, AppError> {
        let rows = sqlx::query_as::<_, FooterContent>(
            "SELECT * FROM footer_contents WHERE ($1 OR is_active) ORDER BY position, section",
        )
        .bind(include_inactive)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    pub async fn upsert_footer(&self, section: &str, input: &FooterInput) -> Result<FooterContent, AppError> {
        let row = sqlx::query_as::<_, FooterContent>(
            r#"
            INSERT INTO footer_contents (section, title, content, position, is_active, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (section) DO UPDATE SET
                title = EXCLUDED.title,
                content = EXCLUDED.content,
                position = EXCLUDED.position,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(section)
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.position)
        .bind(input.is_active)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn delete_footer(&self, section: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM footer_contents WHERE section = $1")
            .bind(section)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // Page sections

    pub async fn page_content(&self, page_key: &str) -> Result<Vec<PageContent>, AppError> {
        let rows = sqlx::query_as::<_, PageContent>(
            "SELECT * FROM page_contents WHERE page_key = $1 ORDER BY section",
        )
        .bind(page_key)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    pub async fn upsert_page_content(
        &self,
        page_key: &str,
        section: &str,
        content: &serde_json::Value,
    ) -> Result<PageContent, AppError> {
        let row = sqlx::query_as::<_, PageContent>(
            r#"
            INSERT INTO page_contents (page_key, section, content, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (page_key, section) DO UPDATE SET
                content = EXCLUDED.content,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(page_key)
        .bind(section)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    // Static pages

    pub async fn list_static_pages(&self, include_unpublished: bool) -> Result<Vec<StaticPage>, AppError> {
        let rows = sqlx::query_as::<_, StaticPage>(
            "SELECT * FROM static_pages WHERE ($1 OR published) ORDER BY title",
        )
        .bind(include_unpublished)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    pub async fn get_static_page(&self, slug: &str) -> Result<Option<StaticPage>, AppError> {
        let row = sqlx::query_as::<_, StaticPage>("SELECT * FROM static_pages WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool())
            .await?;

        Ok(row)
    }

    pub async fn create_static_page(&self, input: &StaticPageInput, slug: &str) -> Result<StaticPage, AppError> {
        let row = sqlx::query_as::<_, StaticPage>(
            r#"
            INSERT INTO static_pages (slug, title, content, meta_description, published)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(slug)
        .bind(input.title.trim())
        .bind(&input.content)
        .bind(&input.meta_description)
        .bind(input.published)
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn update_static_page(&self, id: i32, input: &StaticPageInput, slug: &str) -> Result<StaticPage, AppError> {
        let row = sqlx::query_as::<_, StaticPage>(
            r#"
            UPDATE static_pages SET
                slug = $1, title = $2, content = $3, meta_description = $4, published = $5, updated_at = $6
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(slug)
        .bind(input.title.trim())
        .bind(&input.content)
        .bind(&input.meta_description)
        .bind(input.published)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn delete_static_page(&self, id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM static_pages WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_folds_nordic_letters() {
        assert_eq!(slugify("Äimärautio & Höyhtyä"), "aimarautio-hoyhtya");
        assert_eq!(slugify("  Asuntokaupan 10 vinkkiä!  "), "asuntokaupan-10-vinkkia");
        assert_eq!(slugify("--Tietosuoja--"), "tietosuoja");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn explicit_slug_wins_over_title() {
        let input = PostInput {
            title: "Markkinakatsaus 2024".into(),
            slug: Some("Katsaus".into()),
            excerpt: None,
            content: "Sisältö".into(),
            cover_image: None,
            category: None,
            tags: vec![],
            published: false,
        };
        assert_eq!(input.validate().unwrap(), "katsaus");

        let untitled = PostInput {
            slug: None,
            title: "???".into(),
            ..input
        };
        assert!(untitled.validate().is_err());
    }

    #[test]
    fn neighborhood_requires_coordinate_pairs() {
        let input = NeighborhoodInput {
            name: "Toppila".into(),
            slug: None,
            city: "Oulu".into(),
            description: String::new(),
            image_url: None,
            latitude: Some(65.04),
            longitude: None,
            highlights: vec![],
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn footer_input_defaults_to_active() {
        let input: FooterInput =
            serde_json::from_value(serde_json::json!({ "content": { "links": [] } })).unwrap();
        assert!(input.is_active);
        assert_eq!(input.position, 0);
    }
}
