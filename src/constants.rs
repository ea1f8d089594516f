// Headers
pub const AUTHORIZATION: &str = "Authorization";

//table_name
pub const USER_TABLE_NAME: &str = "user";
pub const COURSE_TABLE_NAME: &str = "course";
pub const CATEGORY_TABLE_NAME: &str = "category";
pub const POST_TABLE_NAME: &str = "post";
pub const COMMENT_TABLE_NAME: &str = "comment";
pub const POST_LIKE_TABLE_NAME: &str = "post_like";
pub const POST_COLLECT_TABLE_NAME: &str = "post_collect";

pub const POSTGRES_POOL_SIZE: usize = 8;
pub const REDIS_POOL_SIZE: u64 = 10;

//role
pub const ADMIN: &str = "admin";
pub const TEACHER: &str = "teacher";
pub const STUDENT: &str = "student";

// page sizes
pub const FORUM_INDEX_PAGE_SIZE: i64 = 20;
pub const COURSE_POSTS_PAGE_SIZE: i64 = 10;
pub const MY_POSTS_PAGE_SIZE: i64 = 15;
pub const MY_COLLECTED_PAGE_SIZE: i64 = 15;
pub const COMMENTS_PAGE_SIZE: i64 = 10;
pub const RANKING_SIZE: isize = 100;

// redis
pub const POINTS_RANKING_ZSET: &str = "user_points_zset";
pub const POINTS_RANKING_VERSION: &str = "user_points_zset:version";
pub const POINTS_RANKING_EXPIRE: usize = 24 * 3600;

pub const ANONYMOUS_AUTHOR: &str = "匿名用户";
