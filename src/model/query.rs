//! Post listing filters and sort orders, rendered into SQL fragments.

use serde::Deserialize;
use tokio_postgres::types::ToSql;

pub type SqlParam = Box<dyn ToSql + Sync + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseFilter {
    Any,
    NoCourse,
    Course(i64),
}

impl CourseFilter {
    /// `none` or `0` selects posts without a course; unparsable ids are
    /// ignored.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(str::trim) {
            Some("none") | Some("0") => CourseFilter::NoCourse,
            Some(x) => x.parse().map(CourseFilter::Course).unwrap_or(CourseFilter::Any),
            None => CourseFilter::Any,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Newest,
    Popular,
    Bounty,
    Heat,
}

impl SortKey {
    pub fn parse(s: Option<&str>, default: SortKey) -> Self {
        match s {
            Some("newest") => SortKey::Newest,
            Some("popular") => SortKey::Popular,
            Some("bounty") => SortKey::Bounty,
            Some("hot") | Some("heat") => SortKey::Heat,
            _ => default,
        }
    }

    /// Every key ends with `created_at DESC, id DESC`, so the order is total.
    pub fn order_by(self, alias: &str) -> String {
        let primary = match self {
            SortKey::Newest => None,
            SortKey::Popular => Some("view_count"),
            SortKey::Bounty => Some("bounty_points"),
            SortKey::Heat => Some("heat_score"),
        };
        let mut keys: Vec<String> = Vec::new();
        if let Some(p) = primary {
            keys.push(format!("{}.{} DESC", alias, p));
        }
        keys.push(format!("{}.created_at DESC", alias));
        keys.push(format!("{}.id DESC", alias));
        format!("ORDER BY {}", keys.join(", "))
    }
}

/// Raw query string of the listing endpoints. Everything is optional and
/// parsed leniently: bad values fall back to defaults.
#[derive(Deserialize, Debug, Default)]
pub struct ListQuery {
    pub course_id: Option<String>,
    pub category_id: Option<String>,
    pub keyword: Option<String>,
    pub has_bounty: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
}

impl ListQuery {
    pub fn into_post_query(self, default_sort: SortKey, page_size: i64) -> PostQuery {
        PostQuery {
            course: CourseFilter::parse(self.course_id.as_deref()),
            category_id: self.category_id.and_then(|s| s.trim().parse().ok()),
            keyword: self.keyword.filter(|k| !k.trim().is_empty()),
            has_bounty: self.has_bounty.as_deref() == Some("1"),
            author: None,
            sort: SortKey::parse(self.sort_by.as_deref(), default_sort),
            page: parse_page(self.page.as_deref()),
            page_size,
        }
    }
}

pub fn parse_page(s: Option<&str>) -> i64 {
    s.and_then(|x| x.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

/// Pages past the end land on the last page.
pub fn clamp_page(page: i64, count: i64, page_size: i64) -> i64 {
    let last = ((count + page_size - 1) / page_size).max(1);
    page.clamp(1, last)
}

#[derive(Debug, Clone)]
pub struct PostQuery {
    pub course: CourseFilter,
    pub category_id: Option<i64>,
    pub keyword: Option<String>,
    pub has_bounty: bool,
    pub author: Option<i64>,
    pub sort: SortKey,
    pub page: i64,
    pub page_size: i64,
}

impl PostQuery {
    pub fn new(sort: SortKey, page: i64, page_size: i64) -> Self {
        Self {
            course: CourseFilter::Any,
            category_id: None,
            keyword: None,
            has_bounty: false,
            author: None,
            sort,
            page,
            page_size,
        }
    }

    /// WHERE clause over the post table aliased as `alias`, numbered from `$1`.
    pub fn where_clause(&self, alias: &str) -> (String, Vec<SqlParam>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<SqlParam> = Vec::new();
        match self.course {
            CourseFilter::Any => (),
            CourseFilter::NoCourse => conditions.push(format!("{}.course_id IS NULL", alias)),
            CourseFilter::Course(id) => {
                params.push(Box::new(id));
                conditions.push(format!("{}.course_id = ${}", alias, params.len()));
            }
        }
        if let Some(id) = self.category_id {
            params.push(Box::new(id));
            conditions.push(format!("{}.category_id = ${}", alias, params.len()));
        }
        if let Some(uid) = self.author {
            params.push(Box::new(uid));
            conditions.push(format!("{}.uid = ${}", alias, params.len()));
        }
        if let Some(keyword) = &self.keyword {
            params.push(Box::new(like_pattern(keyword)));
            conditions.push(format!(
                "({a}.title ILIKE ${n} OR {a}.content ILIKE ${n})",
                a = alias,
                n = params.len()
            ));
        }
        if self.has_bounty {
            conditions.push(format!("{}.bounty_points > 0", alias));
        }
        let clause = match conditions.is_empty() {
            true => String::new(),
            false => format!("WHERE {}", conditions.join(" AND ")),
        };
        (clause, params)
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.page_size
    }
}

/// `%keyword%` with LIKE wildcards in the keyword escaped.
pub fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounty_sort_breaks_ties_by_newest() {
        assert_eq!(
            SortKey::Bounty.order_by("p"),
            "ORDER BY p.bounty_points DESC, p.created_at DESC, p.id DESC"
        );
        assert_eq!(
            SortKey::Newest.order_by("p"),
            "ORDER BY p.created_at DESC, p.id DESC"
        );
    }

    #[test]
    fn sort_parsing_accepts_hot_and_falls_back() {
        assert_eq!(SortKey::parse(Some("hot"), SortKey::Newest), SortKey::Heat);
        assert_eq!(SortKey::parse(Some("popular"), SortKey::Heat), SortKey::Popular);
        assert_eq!(SortKey::parse(Some("weird"), SortKey::Newest), SortKey::Newest);
        assert_eq!(SortKey::parse(None, SortKey::Heat), SortKey::Heat);
    }

    #[test]
    fn course_filter_parsing() {
        assert_eq!(CourseFilter::parse(Some("none")), CourseFilter::NoCourse);
        assert_eq!(CourseFilter::parse(Some("0")), CourseFilter::NoCourse);
        assert_eq!(CourseFilter::parse(Some("12")), CourseFilter::Course(12));
        assert_eq!(CourseFilter::parse(Some("abc")), CourseFilter::Any);
        assert_eq!(CourseFilter::parse(None), CourseFilter::Any);
    }

    #[test]
    fn empty_query_has_no_where() {
        let q = PostQuery::new(SortKey::Heat, 1, 20);
        let (clause, params) = q.where_clause("p");
        assert_eq!(clause, "");
        assert!(params.is_empty());
    }

    #[test]
    fn filters_are_numbered_in_order() {
        let mut q = PostQuery::new(SortKey::Heat, 1, 20);
        q.course = CourseFilter::Course(3);
        q.category_id = Some(2);
        q.keyword = Some("递归".into());
        q.has_bounty = true;
        let (clause, params) = q.where_clause("p");
        assert_eq!(
            clause,
            "WHERE p.course_id = $1 AND p.category_id = $2 AND (p.title ILIKE $3 OR p.content ILIKE $3) AND p.bounty_points > 0"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn no_course_filter_needs_no_param() {
        let mut q = PostQuery::new(SortKey::Newest, 1, 10);
        q.course = CourseFilter::NoCourse;
        q.author = Some(4);
        let (clause, params) = q.where_clause("p");
        assert_eq!(clause, "WHERE p.course_id IS NULL AND p.uid = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
    }

    #[test]
    fn list_query_is_lenient() {
        let q = ListQuery {
            course_id: Some("none".into()),
            category_id: Some("x".into()),
            keyword: Some("  ".into()),
            has_bounty: Some("1".into()),
            sort_by: Some("bounty".into()),
            page: Some("-3".into()),
        }
        .into_post_query(SortKey::Heat, 20);
        assert_eq!(q.course, CourseFilter::NoCourse);
        assert_eq!(q.category_id, None);
        assert_eq!(q.keyword, None);
        assert!(q.has_bounty);
        assert_eq!(q.sort, SortKey::Bounty);
        assert_eq!(q.page, 1);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn pages_clamp_to_the_last_one() {
        assert_eq!(clamp_page(5, 41, 20), 3);
        assert_eq!(clamp_page(2, 0, 20), 1);
        assert_eq!(clamp_page(2, 40, 20), 2);
    }
}
