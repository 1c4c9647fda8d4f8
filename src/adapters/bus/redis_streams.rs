//! Redis Streams-backed bus (durable, at-least-once delivery).
//!
//! Mapping onto streams:
//! - **Topic**: a stream key
//! - **Subscription**: a consumer group on that stream
//! - **Lease**: an entry in the group's pending list, owned by this consumer
//! - **Abandon**: the entry's idle time is pushed past the claim threshold so
//!   the next `XAUTOCLAIM` redelivers it
//! - **Dead letter**: the entry is copied to `{stream}:dlq` with the reason,
//!   then acknowledged
//!
//! Each stream entry carries the message body in `body`, the content type in
//! `content_type` and every application property as `prop:{name}`.
//!
//! Blocking reads use connections from a small pool so that `XREADGROUP BLOCK`
//! never stalls settlement traffic on the shared connection.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;

use redis::aio::MultiplexedConnection;
use redis::{RedisError, Value};

use crate::domain::envelope::{encode, encode_binary, Envelope, RawMessage};
use crate::domain::foundation::short_unique_suffix;
use crate::domain::subscription::SubscriptionPath;
use crate::ports::{BusAdministration, BusError, BusReceiver, EventPublisher, PublishError};

const BODY_FIELD: &str = "body";
const CONTENT_TYPE_FIELD: &str = "content_type";
const PROPERTY_FIELD_PREFIX: &str = "prop:";
const DLQ_SUFFIX: &str = ":dlq";

/// Pending entries idle longer than this are reclaimed by any consumer.
pub const DEFAULT_CLAIM_IDLE: Duration = Duration::from_secs(60);

/// Opens a multiplexed connection to `url`.
pub async fn connect(url: &str) -> Result<(redis::Client, MultiplexedConnection), BusError> {
    let client = redis::Client::open(url).map_err(|e| BusError::Unavailable(e.to_string()))?;
    let conn = client
        .get_multiplexed_tokio_connection()
        .await
        .map_err(|e| BusError::Unavailable(e.to_string()))?;
    Ok((client, conn))
}

#[derive(Clone)]
pub struct RedisStreamsBus {
    client: redis::Client,
    conn: MultiplexedConnection,
    blocking: std::sync::Arc<Mutex<Vec<MultiplexedConnection>>>,
    consumer: String,
    claim_idle: Duration,
}

impl RedisStreamsBus {
    pub fn new(client: redis::Client, conn: MultiplexedConnection) -> Self {
        Self {
            client,
            conn,
            blocking: std::sync::Arc::new(Mutex::new(Vec::new())),
            consumer: format!("background-jobs-{}", short_unique_suffix()),
            claim_idle: DEFAULT_CLAIM_IDLE,
        }
    }

    /// Sets the consumer name used within every group.
    pub fn with_consumer_name(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }

    /// Sets how long a lease stays valid without renewal.
    pub fn with_claim_idle(mut self, claim_idle: Duration) -> Self {
        self.claim_idle = claim_idle;
        self
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer
    }

    /// Appends a message to the topic's stream, returning the entry id.
    pub async fn add(&self, topic: &str, message: &RawMessage) -> Result<String, BusError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("XADD");
        cmd.arg(topic).arg("*");
        for (field, value) in message_fields(message) {
            cmd.arg(field).arg(value);
        }
        cmd.query_async::<_, String>(&mut conn).await.map_err(bus_error)
    }

    async fn checkout_blocking(&self) -> Result<MultiplexedConnection, BusError> {
        if let Some(conn) = self.blocking.lock().await.pop() {
            return Ok(conn);
        }
        self.client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| BusError::Unavailable(e.to_string()))
    }

    async fn checkin_blocking(&self, conn: MultiplexedConnection) {
        self.blocking.lock().await.push(conn);
    }

    async fn group_names(&self, topic: &str) -> Result<Vec<String>, BusError> {
        let mut conn = self.conn.clone();
        let reply: Result<Value, RedisError> = redis::cmd("XINFO")
            .arg("GROUPS")
            .arg(topic)
            .query_async(&mut conn)
            .await;
        match reply {
            Ok(value) => Ok(group_names_from_value(&value)),
            Err(e) if is_missing_stream(&e) => Ok(Vec::new()),
            Err(e) => Err(bus_error(e)),
        }
    }

    async fn delivery_count(&self, path: &SubscriptionPath, id: &str) -> Result<u32, BusError> {
        let mut conn = self.conn.clone();
        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(&path.topic)
            .arg(&path.name)
            .arg(id)
            .arg(id)
            .arg(1)
            .query_async(&mut conn)
            .await
            .map_err(|e| receive_error(path, e))?;
        Ok(pending
            .first()
            .map(|(_, _, _, count)| u32::try_from(*count).unwrap_or(u32::MAX))
            .unwrap_or(1))
    }

    /// Claims entries other consumers (or abandon) left idle past the threshold.
    async fn reclaim(&self, path: &SubscriptionPath, max_batch: usize) -> Result<Vec<RawMessage>, BusError> {
        let mut conn = self.conn.clone();
        let reply: Value = redis::cmd("XAUTOCLAIM")
            .arg(&path.topic)
            .arg(&path.name)
            .arg(&self.consumer)
            .arg(millis(self.claim_idle))
            .arg("0-0")
            .arg("COUNT")
            .arg(max_batch)
            .query_async(&mut conn)
            .await
            .map_err(|e| receive_error(path, e))?;

        let entries = match &reply {
            Value::Bulk(parts) => parts.get(1).map(entries_from_value).unwrap_or_default(),
            _ => Vec::new(),
        };

        let mut messages = Vec::with_capacity(entries.len());
        for entry in entries {
            let count = self.delivery_count(path, &entry.id).await?;
            messages.push(entry.into_message().with_delivery_count(count));
        }
        Ok(messages)
    }

    async fn read_new(
        &self,
        path: &SubscriptionPath,
        max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<RawMessage>, BusError> {
        let mut conn = self.checkout_blocking().await?;
        let reply: Result<Value, RedisError> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&path.name)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(max_batch)
            .arg("BLOCK")
            .arg(millis(wait).max(1))
            .arg("STREAMS")
            .arg(&path.topic)
            .arg(">")
            .query_async(&mut conn)
            .await;
        self.checkin_blocking(conn).await;

        let reply = reply.map_err(|e| receive_error(path, e))?;
        Ok(streams_from_value(&reply)
            .into_iter()
            .map(StreamEntry::into_message)
            .collect())
    }

    async fn ack(&self, path: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let acked: u64 = redis::cmd("XACK")
            .arg(&path.topic)
            .arg(&path.name)
            .arg(&message.message_id)
            .query_async(&mut conn)
            .await
            .map_err(bus_error)?;
        if acked == 0 {
            return Err(BusError::LeaseLost {
                message_id: message.message_id.clone(),
            });
        }
        Ok(())
    }

    /// `XCLAIM ... JUSTID` on our own entry; `idle` overrides the idle time.
    async fn touch(
        &self,
        path: &SubscriptionPath,
        message: &RawMessage,
        idle: Option<Duration>,
    ) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&path.topic)
            .arg(&path.name)
            .arg(&self.consumer)
            .arg(0)
            .arg(&message.message_id);
        if let Some(idle) = idle {
            cmd.arg("IDLE").arg(millis(idle));
        }
        cmd.arg("JUSTID");
        let claimed: Vec<String> = cmd.query_async(&mut conn).await.map_err(bus_error)?;
        if claimed.is_empty() {
            return Err(BusError::LeaseLost {
                message_id: message.message_id.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BusAdministration for RedisStreamsBus {
    async fn subscription_exists(&self, topic: &str, subscription: &str) -> Result<bool, BusError> {
        Ok(self.group_names(topic).await?.iter().any(|g| g == subscription))
    }

    async fn create_subscription(&self, topic: &str, subscription: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let created: Result<(), RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(topic)
            .arg(subscription)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Err(BusError::AlreadyExists {
                topic: topic.to_string(),
                subscription: subscription.to_string(),
            }),
            Err(e) => Err(bus_error(e)),
        }
    }

    async fn delete_subscription(&self, topic: &str, subscription: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let destroyed: Result<u64, RedisError> = redis::cmd("XGROUP")
            .arg("DESTROY")
            .arg(topic)
            .arg(subscription)
            .query_async(&mut conn)
            .await;
        match destroyed {
            Ok(0) => Err(not_found(topic, subscription)),
            Ok(_) => Ok(()),
            Err(e) if is_missing_stream(&e) => Err(not_found(topic, subscription)),
            Err(e) => Err(bus_error(e)),
        }
    }

    async fn list_subscriptions(&self, topic: &str) -> Result<Vec<String>, BusError> {
        let mut names = self.group_names(topic).await?;
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl BusReceiver for RedisStreamsBus {
    async fn receive(
        &self,
        subscription: &SubscriptionPath,
        max_batch: usize,
        wait: Duration,
    ) -> Result<Vec<RawMessage>, BusError> {
        let max_batch = max_batch.max(1);
        let reclaimed = self.reclaim(subscription, max_batch).await?;
        if !reclaimed.is_empty() {
            return Ok(reclaimed);
        }
        self.read_new(subscription, max_batch, wait).await
    }

    async fn complete(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError> {
        self.ack(subscription, message).await
    }

    async fn abandon(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError> {
        self.touch(subscription, message, Some(self.claim_idle)).await
    }

    async fn dead_letter(
        &self,
        subscription: &SubscriptionPath,
        message: &RawMessage,
        reason: &str,
    ) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("XADD");
        cmd.arg(format!("{}{}", subscription.topic, DLQ_SUFFIX))
            .arg("*")
            .arg("original_message_id")
            .arg(&message.message_id)
            .arg("subscription")
            .arg(&subscription.name)
            .arg("reason")
            .arg(reason)
            .arg("delivery_count")
            .arg(message.delivery_count)
            .arg("failed_at")
            .arg(chrono::Utc::now().to_rfc3339());
        for (field, value) in message_fields(message) {
            cmd.arg(field).arg(value);
        }
        cmd.query_async::<_, String>(&mut conn).await.map_err(bus_error)?;

        self.ack(subscription, message).await
    }

    async fn renew_lease(&self, subscription: &SubscriptionPath, message: &RawMessage) -> Result<(), BusError> {
        self.touch(subscription, message, None).await
    }
}

/// Publishes envelopes onto a stream in structured or binary content mode.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    bus: RedisStreamsBus,
    stream: String,
    binary: bool,
}

impl RedisStreamPublisher {
    pub fn new(bus: RedisStreamsBus, stream: impl Into<String>) -> Self {
        Self {
            bus,
            stream: stream.into(),
            binary: false,
        }
    }

    /// Carries attributes as `ce-*` properties instead of a JSON document.
    pub fn binary_mode(mut self) -> Self {
        self.binary = true;
        self
    }
}

#[async_trait]
impl EventPublisher for RedisStreamPublisher {
    async fn publish(&self, envelope: Envelope) -> Result<(), PublishError> {
        let message = if self.binary {
            encode_binary(&envelope)
        } else {
            encode(&envelope)
        };
        self.bus
            .add(&self.stream, &message)
            .await
            .map(|_| ())
            .map_err(|e| PublishError::new(envelope.id.as_str(), e.to_string()))
    }
}

// === Wire Helpers ===

#[derive(Debug, Clone, PartialEq)]
struct StreamEntry {
    id: String,
    fields: Vec<(String, Vec<u8>)>,
}

impl StreamEntry {
    fn into_message(self) -> RawMessage {
        let mut body = Vec::new();
        let mut content_type = None;
        let mut properties = BTreeMap::new();
        for (field, value) in self.fields {
            if field == BODY_FIELD {
                body = value;
            } else if field == CONTENT_TYPE_FIELD {
                content_type = Some(String::from_utf8_lossy(&value).into_owned());
            } else if let Some(key) = field.strip_prefix(PROPERTY_FIELD_PREFIX) {
                properties.insert(key.to_string(), String::from_utf8_lossy(&value).into_owned());
            }
        }

        let mut message = RawMessage::new(self.id, body);
        message.content_type = content_type;
        message.properties = properties;
        message
    }
}

fn message_fields(message: &RawMessage) -> Vec<(String, Vec<u8>)> {
    let mut fields = vec![(BODY_FIELD.to_string(), message.body.clone())];
    if let Some(content_type) = &message.content_type {
        fields.push((CONTENT_TYPE_FIELD.to_string(), content_type.as_bytes().to_vec()));
    }
    for (key, value) in &message.properties {
        fields.push((format!("{PROPERTY_FIELD_PREFIX}{key}"), value.as_bytes().to_vec()));
    }
    fields
}

fn bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Data(data) => Some(data.clone()),
        Value::Status(s) => Some(s.as_bytes().to_vec()),
        Value::Int(i) => Some(i.to_string().into_bytes()),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    bytes(value).map(|b| String::from_utf8_lossy(&b).into_owned())
}

/// Parses `[[id, [field, value, ...]], ...]`; entries deleted from the
/// stream come back with nil fields and are skipped.
fn entries_from_value(value: &Value) -> Vec<StreamEntry> {
    let Value::Bulk(entries) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let Value::Bulk(parts) = entry else {
                return None;
            };
            let id = parts.first().and_then(text)?;
            let Some(Value::Bulk(raw_fields)) = parts.get(1) else {
                return None;
            };
            let fields = raw_fields
                .chunks(2)
                .filter_map(|pair| match pair {
                    [key, value] => Some((text(key)?, bytes(value)?)),
                    _ => None,
                })
                .collect();
            Some(StreamEntry { id, fields })
        })
        .collect()
}

/// Parses an `XREADGROUP` reply: nil on timeout, else `[[stream, entries], ...]`.
fn streams_from_value(value: &Value) -> Vec<StreamEntry> {
    let Value::Bulk(streams) = value else {
        return Vec::new();
    };
    streams
        .iter()
        .flat_map(|stream| match stream {
            Value::Bulk(parts) => parts.get(1).map(entries_from_value).unwrap_or_default(),
            _ => Vec::new(),
        })
        .collect()
}

/// Parses `XINFO GROUPS`: one flat `[key, value, ...]` list per group.
fn group_names_from_value(value: &Value) -> Vec<String> {
    let Value::Bulk(groups) = value else {
        return Vec::new();
    };
    groups
        .iter()
        .filter_map(|group| {
            let Value::Bulk(pairs) = group else {
                return None;
            };
            pairs.chunks(2).find_map(|pair| match pair {
                [key, value] if text(key).as_deref() == Some("name") => text(value),
                _ => None,
            })
        })
        .collect()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn is_missing_stream(err: &RedisError) -> bool {
    err.to_string().to_ascii_lowercase().contains("no such key")
}

fn not_found(topic: &str, subscription: &str) -> BusError {
    BusError::NotFound {
        topic: topic.to_string(),
        subscription: subscription.to_string(),
    }
}

fn receive_error(path: &SubscriptionPath, err: RedisError) -> BusError {
    if err.code() == Some("NOGROUP") {
        return not_found(&path.topic, &path.name);
    }
    bus_error(err)
}

fn bus_error(err: RedisError) -> BusError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        BusError::Unavailable(err.to_string())
    } else {
        BusError::Operation(err.to_string())
    }
}
