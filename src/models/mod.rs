mod analysis;
mod content;
mod link;
mod message;
mod user;
mod user_article;

pub use analysis::{Analysis, NewAnalysis, Scores};
pub use content::{Content, NewContent};
pub use link::{Link, NewLink};
pub use message::{Message, Role};
pub use user::User;
pub use user_article::{DigestEntry, NewUserArticle, UserArticle};
