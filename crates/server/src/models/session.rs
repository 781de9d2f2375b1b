//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use emporium_core::{ConversationId, Email, OrderId, UserId, UserRole};

use super::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Role at login time.
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for order ids placed from this session (guest order access).
    pub const PLACED_ORDERS: &str = "placed_orders";

    /// Key for chat conversation ids opened from this session.
    pub const CONVERSATIONS: &str = "conversations";
}

/// Ids this session may read without being logged in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrants<T> {
    pub ids: Vec<T>,
}

impl<T> Default for SessionGrants<T> {
    fn default() -> Self {
        Self { ids: Vec::new() }
    }
}

impl<T: PartialEq + Copy> SessionGrants<T> {
    /// Most recent grants kept per session.
    pub const MAX: usize = 20;

    /// Remember `id`, dropping the oldest grant beyond [`Self::MAX`].
    pub fn grant(&mut self, id: T) {
        if self.ids.contains(&id) {
            return;
        }
        self.ids.push(id);
        if self.ids.len() > Self::MAX {
            self.ids.remove(0);
        }
    }

    #[must_use]
    pub fn contains(&self, id: T) -> bool {
        self.ids.contains(&id)
    }
}

/// Orders placed from this session.
pub type PlacedOrders = SessionGrants<OrderId>;

/// Conversations opened from this session.
pub type SessionConversations = SessionGrants<ConversationId>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_deduplicates() {
        let mut grants = PlacedOrders::default();
        grants.grant(OrderId::new(1));
        grants.grant(OrderId::new(1));
        assert_eq!(grants.ids.len(), 1);
        assert!(grants.contains(OrderId::new(1)));
        assert!(!grants.contains(OrderId::new(2)));
    }

    #[test]
    fn test_grant_drops_oldest() {
        let mut grants = SessionConversations::default();
        for id in 0..=20 {
            grants.grant(ConversationId::new(id));
        }
        assert_eq!(grants.ids.len(), SessionConversations::MAX);
        assert!(!grants.contains(ConversationId::new(0)));
        assert!(grants.contains(ConversationId::new(20)));
    }

    #[test]
    fn test_default_grants_are_empty() {
        let grants = SessionGrants::<OrderId>::default();
        assert!(grants.ids.is_empty());
        assert!(!grants.contains(OrderId::new(1)));
    }
}
