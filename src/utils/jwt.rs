use crate::config::env;
use crate::constants;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use lazy_static::lazy_static;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

lazy_static! {
    static ref VALIDATION: Validation = Validation::new(Algorithm::HS256);
    pub static ref SECRET: String = env::get_key("JWT_HS256_KEY");
    static ref DK: DecodingKey<'static> = DecodingKey::from_secret(SECRET.as_bytes());
}

/// Claims of the bearer token issued by the account service.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserToken {
    pub iat: i64, // 签发时间
    pub exp: i64, // 过期时间, validation 默认检查
    pub id: i64,
    pub user: String, //用户名
    pub role: String, //身份
}

impl UserToken {
    pub fn is_admin(&self) -> bool {
        self.role == constants::ADMIN
    }

    /// Students and teachers post; admins only moderate.
    pub fn can_post(&self) -> bool {
        self.role == constants::STUDENT || self.role == constants::TEACHER
    }
}

pub fn decode<T: DeserializeOwned>(token: &str) -> Result<T, ErrorKind> {
    match jsonwebtoken::decode::<T>(token, &DK, &*VALIDATION) {
        Ok(res) => Ok(res.claims),
        Err(e) => Err(e.into_kind()),
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    pub const TEST_KEY: &str = "course-forum-test-key";

    /// Signs a token for `role`, valid for an hour.
    pub fn token_for(id: i64, role: &str) -> String {
        std::env::set_var("JWT_HS256_KEY", TEST_KEY);
        let now = chrono::Local::now().timestamp();
        let claims = UserToken {
            iat: now,
            exp: now + 3600,
            id,
            user: format!("user{}", id),
            role: role.to_string(),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_KEY.as_bytes()),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::token_for;
    use super::*;

    #[test]
    fn decodes_a_signed_token() {
        let token = token_for(7, constants::TEACHER);
        let claims = decode::<UserToken>(token.as_str()).unwrap();
        assert_eq!(claims.id, 7);
        assert!(claims.can_post());
        assert!(!claims.is_admin());
    }

    #[test]
    fn rejects_garbage() {
        token_for(1, constants::STUDENT);
        assert!(decode::<UserToken>("not.a.token").is_err());
    }
}
