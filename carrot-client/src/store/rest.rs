use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, header};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shared::{
    BackendConfig, ErrorResponse,
    models::{
        Comment, CommentId, ConversationKey, ListingId, Message, MessageId, NewComment,
        NewMessage, Timestamp, UserId,
    },
};
use tracing::debug;

use super::{CommentStore, MessageStore, TableNames};
use crate::error::{ClientError, ClientResult};

const PREFER_REPRESENTATION: &str = "return=representation";
const ACCEPT_PROFILE: &str = "Accept-Profile";
const CONTENT_PROFILE: &str = "Content-Profile";

/// Table access over the hosted backend's REST dialect.
#[derive(Clone, Debug)]
pub struct RestStore {
    base_url: String,
    client: Client,
    api_key: String,
    tables: TableNames,
    access_token: Arc<Mutex<Option<String>>>,
}

impl RestStore {
    /// Builds a store for the configured backend.
    ///
    /// # Errors
    /// Fails when the REST URL cannot be derived or the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            base_url: config.rest_url()?.to_string(),
            client,
            api_key: config.api_key.clone(),
            tables: TableNames::from(config),
            access_token: Arc::new(Mutex::new(None)),
        })
    }

    /// Authorises subsequent requests as a signed-in user instead of the
    /// anonymous key.
    pub fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.access_token.lock() {
            *guard = token;
        }
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.access_token
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().cloned())
    }

    #[must_use]
    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}{}", self.base_url, table.trim_start_matches('/'))
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self
            .current_access_token()
            .unwrap_or_else(|| self.api_key.clone());
        let profile = if method == Method::GET {
            ACCEPT_PROFILE
        } else {
            CONTENT_PROFILE
        };

        let mut request = self
            .client
            .request(method.clone(), self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .header(profile, &self.tables.schema);
        if method != Method::GET {
            request = request.header("Prefer", PREFER_REPRESENTATION);
        }
        request
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    async fn single<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<Option<T>> {
        let rows: Vec<T> = self.execute(request).await?;
        Ok(rows.into_iter().next())
    }

    /// Distinguishes "no such row" from "row exists but the filter excluded it".
    async fn probe(&self, table: &str, id: &str) -> ClientError {
        let filter = format!("eq.{id}");
        let request = self
            .request(Method::GET, table)
            .query(&[("select", "id"), ("id", filter.as_str())]);
        match self.execute::<Vec<Value>>(request).await {
            Ok(rows) if rows.is_empty() => ClientError::NotFound(format!("{table} {id}")),
            Ok(_) => ClientError::Permission(format!("{table} {id} belongs to another user")),
            Err(err) => err,
        }
    }
}

pub(crate) async fn error_for_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorResponse>(&text)
        .unwrap_or_else(|_| ErrorResponse::new(text.trim()));
    debug!(status = %status, error = %body, "backend rejected request");
    Err(ClientError::from_status(status, body))
}

fn pair_filter(key: &ConversationKey) -> String {
    format!(
        "(and(sender_id.eq.{a},receiver_id.eq.{b}),and(sender_id.eq.{b},receiver_id.eq.{a}))",
        a = key.low,
        b = key.high
    )
}

#[async_trait]
impl MessageStore for RestStore {
    async fn fetch_messages(&self, key: &ConversationKey) -> ClientResult<Vec<Message>> {
        debug!(conversation = %key, table = %self.tables.messages, "fetching messages");
        let request = self.request(Method::GET, &self.tables.messages).query(&[
            ("select", "*".to_string()),
            ("listing_id", format!("eq.{}", key.listing_id)),
            ("is_deleted", "eq.false".to_string()),
            ("or", pair_filter(key)),
            ("order", "created_at.asc".to_string()),
        ]);
        self.execute(request).await
    }

    async fn send_message(&self, message: &NewMessage) -> ClientResult<Message> {
        debug!(message_id = %message.id, listing_id = %message.listing_id, "sending message");
        let request = self
            .request(Method::POST, &self.tables.messages)
            .json(message);
        self.single(request)
            .await?
            .ok_or_else(|| ClientError::Decode("insert returned no row".into()))
    }

    async fn mark_read(&self, id: MessageId, reader: UserId) -> ClientResult<Message> {
        let table = &self.tables.messages;
        let request = self
            .request(Method::PATCH, table)
            .query(&[
                ("id", format!("eq.{id}")),
                ("receiver_id", format!("eq.{reader}")),
                ("read_at", "is.null".to_string()),
            ])
            .json(&json!({ "read_at": Timestamp::now() }));
        if let Some(message) = self.single(request).await? {
            return Ok(message);
        }

        // Nothing updated: either already read, addressed to someone else, or absent.
        let lookup = self
            .request(Method::GET, table)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        match self.single::<Message>(lookup).await? {
            Some(message) if message.receiver_id == reader => Ok(message),
            Some(_) => Err(ClientError::Permission(format!(
                "message {id} is not addressed to {reader}"
            ))),
            None => Err(ClientError::NotFound(format!("{table} {id}"))),
        }
    }

    async fn recent_messages(&self, user: UserId, limit: usize) -> ClientResult<Vec<Message>> {
        let request = self.request(Method::GET, &self.tables.messages).query(&[
            ("select", "*".to_string()),
            ("or", format!("(sender_id.eq.{user},receiver_id.eq.{user})")),
            ("is_deleted", "eq.false".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        self.execute(request).await
    }
}

#[async_trait]
impl CommentStore for RestStore {
    async fn fetch_comments(&self, listing: ListingId) -> ClientResult<Vec<Comment>> {
        debug!(listing_id = %listing, table = %self.tables.comments, "fetching comments");
        let request = self.request(Method::GET, &self.tables.comments).query(&[
            ("select", "*".to_string()),
            ("listing_id", format!("eq.{listing}")),
            ("order", "created_at.asc".to_string()),
        ]);
        self.execute(request).await
    }

    async fn create_comment(&self, comment: &NewComment) -> ClientResult<Comment> {
        let request = self
            .request(Method::POST, &self.tables.comments)
            .json(comment);
        self.single(request)
            .await?
            .ok_or_else(|| ClientError::Decode("insert returned no row".into()))
    }

    async fn edit_comment(
        &self,
        id: CommentId,
        actor: UserId,
        body: &str,
    ) -> ClientResult<Comment> {
        let table = &self.tables.comments;
        let request = self
            .request(Method::PATCH, table)
            .query(&[("id", format!("eq.{id}")), ("author_id", format!("eq.{actor}"))])
            .json(&json!({ "body": body, "updated_at": Timestamp::now() }));
        match self.single(request).await? {
            Some(comment) => Ok(comment),
            None => Err(self.probe(table, &id.to_string()).await),
        }
    }

    async fn delete_comment(&self, id: CommentId, actor: UserId) -> ClientResult<()> {
        let table = &self.tables.comments;
        let request = self
            .request(Method::DELETE, table)
            .query(&[("id", format!("eq.{id}")), ("author_id", format!("eq.{actor}"))]);
        match self.single::<Comment>(request).await? {
            Some(_) => Ok(()),
            None => Err(self.probe(table, &id.to_string()).await),
        }
    }
}
