// src/services/messaging_service.rs

use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::AppError,
        pagination::{Page, PageParams},
    },
    db::{user_repo::MemberRow, MessageRepository, UserRepository},
    models::{
        auth::{User, UserRole},
        messaging::{Conversation, Message, Recipient, SendMessagePayload},
    },
    services::{notification_service::NotificationService, scope::can_message},
};

const PREVIEW_CHARS: usize = 120;

/// Trecho da mensagem usado no corpo da notificação.
pub fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[derive(Clone)]
pub struct MessagingService {
    repo: MessageRepository,
    user_repo: UserRepository,
    notifications: NotificationService,
}

impl MessagingService {
    pub fn new(repo: MessageRepository, user_repo: UserRepository, notifications: NotificationService) -> Self {
        Self {
            repo,
            user_repo,
            notifications,
        }
    }

    async fn member(&self, id: Uuid) -> Result<MemberRow, AppError> {
        self.user_repo.find_member(id).await?.ok_or(AppError::NotFound("User"))
    }

    pub async fn send(&self, actor: &User, payload: SendMessagePayload) -> Result<Message, AppError> {
        payload.validate()?;

        let sender = self.member(actor.id).await?;
        let recipient = self.member(payload.recipient_id).await?;
        if !can_message(&sender.member(), &recipient.member()) {
            return Err(AppError::forbidden("You cannot message this user"));
        }

        let message = self.repo.insert(actor.id, recipient.user.id, &payload.content).await?;
        tracing::debug!(message_id = %message.id, from = %actor.id, to = %recipient.user.id, "Mensagem enviada");

        self.notifications
            .notify_message(recipient.user.id, actor.name.clone(), preview(&payload.content));
        Ok(message)
    }

    pub async fn conversations(&self, actor: &User) -> Result<Vec<Conversation>, AppError> {
        self.repo.conversations(actor.id).await
    }

    /// A conversa com `counterpart_id`; o que chegou dele passa a lido.
    pub async fn thread(&self, actor: &User, counterpart_id: Uuid, page: PageParams) -> Result<Page<Message>, AppError> {
        let (messages, total) = self.repo.thread(actor.id, counterpart_id, &page).await?;
        self.repo.mark_thread_read(actor.id, counterpart_id).await?;
        Ok(Page::new(messages, &page, total))
    }

    pub async fn recipients(&self, actor: &User) -> Result<Vec<Recipient>, AppError> {
        let sender = self.member(actor.id).await?;
        let district = match actor.role {
            UserRole::Admin => None,
            _ => sender.path.district_id,
        };

        let candidates = self.user_repo.list_members_near(district).await?;

        let me = sender.member();
        Ok(candidates
            .into_iter()
            .filter(|c| can_message(&me, &c.member()))
            .map(|c| Recipient {
                id: c.user.id,
                name: c.user.name,
                email: c.user.email,
                role: c.user.role,
            })
            .collect())
    }

    pub async fn unread_count(&self, actor: &User) -> Result<i64, AppError> {
        self.repo.unread_count(actor.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_kept_whole() {
        assert_eq!(preview("See you Sunday"), "See you Sunday");
    }

    #[test]
    fn long_messages_are_truncated_on_char_boundaries() {
        let long = "é".repeat(PREVIEW_CHARS + 5);
        let p = preview(&long);
        assert!(p.ends_with('…'));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 1);
    }
}
