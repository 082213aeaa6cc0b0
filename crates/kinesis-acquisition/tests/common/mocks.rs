// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Scriptable in-memory Kinesis transport

use async_trait::async_trait;
use kinesis_acquisition::{
    ClientError, ClientFactory, ClientOptions, ConsumerLookup, ConsumerStatus, GetRecordsOutput,
    KinesisClient, Record, RegisteredConsumer, ShardSubscription, StartingPosition,
    SubscriptionEvent,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// In-memory stream.
///
/// - `list_shards` replays the scripted listings, repeating the last one.
/// - Shard iterators are `<shard>:<n>`; `get_records` pops the scripted
///   pages of that shard, then returns empty pages on the same iterator.
/// - The consumer is tracked as present/absent; `describe_stream_consumer`
///   replays its script, then reports `Active` when present and
///   `ResourceNotFound` when absent (or `describe_forever` if set).
/// - Subscriptions push the scripted records of their shard then stay open.
#[derive(Default)]
pub struct MockKinesisClient {
    listings: Mutex<VecDeque<Result<Vec<String>, ClientError>>>,
    last_listing: Mutex<Vec<String>>,
    pages: Mutex<HashMap<String, VecDeque<Result<GetRecordsOutput, ClientError>>>>,
    subscription_records: Mutex<HashMap<String, Vec<Vec<Record>>>>,
    open_subscriptions: Mutex<Vec<mpsc::UnboundedSender<SubscriptionEvent>>>,
    consumer_present: Mutex<bool>,
    deregister_error: Mutex<Option<ClientError>>,
    describe_script: Mutex<VecDeque<Result<ConsumerStatus, ClientError>>>,
    describe_forever: Mutex<Option<Result<ConsumerStatus, ClientError>>>,

    pub list_calls: AtomicUsize,
    pub get_records_calls: Mutex<HashMap<String, usize>>,
    pub register_calls: AtomicUsize,
    pub deregister_calls: AtomicUsize,
    pub describe_calls: AtomicUsize,
    pub closed_subscriptions: Arc<AtomicUsize>,
}

pub fn page(data: &[&str], next: Option<&str>) -> Result<GetRecordsOutput, ClientError> {
    Ok(GetRecordsOutput {
        records: data.iter().map(|d| Record::from_data(*d)).collect(),
        next_shard_iterator: next.map(str::to_string),
    })
}

impl MockKinesisClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(self, shards: &[&str]) -> Self {
        self.listings
            .lock()
            .unwrap()
            .push_back(Ok(shards.iter().map(|s| s.to_string()).collect()));
        self
    }

    pub fn with_listing_error(self, err: ClientError) -> Self {
        self.listings.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_pages(
        self,
        shard: &str,
        pages: Vec<Result<GetRecordsOutput, ClientError>>,
    ) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(shard.to_string(), pages.into());
        self
    }

    pub fn with_subscription_records(self, shard: &str, batches: Vec<Vec<Record>>) -> Self {
        self.subscription_records
            .lock()
            .unwrap()
            .insert(shard.to_string(), batches);
        self
    }

    pub fn with_existing_consumer(self) -> Self {
        *self.consumer_present.lock().unwrap() = true;
        self
    }

    pub fn with_deregister_error(self, err: ClientError) -> Self {
        *self.deregister_error.lock().unwrap() = Some(err);
        self
    }

    pub fn with_describe(self, script: Vec<Result<ConsumerStatus, ClientError>>) -> Self {
        self.describe_script.lock().unwrap().extend(script);
        self
    }

    pub fn with_describe_forever(self, status: Result<ConsumerStatus, ClientError>) -> Self {
        *self.describe_forever.lock().unwrap() = Some(status);
        self
    }

    pub fn consumer_present(&self) -> bool {
        *self.consumer_present.lock().unwrap()
    }

    pub fn reads_of(&self, shard: &str) -> usize {
        self.get_records_calls
            .lock()
            .unwrap()
            .get(shard)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl KinesisClient for MockKinesisClient {
    async fn list_shards(&self, _stream_name: &str) -> Result<Vec<String>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match self.listings.lock().unwrap().pop_front() {
            Some(Ok(shards)) => {
                *self.last_listing.lock().unwrap() = shards.clone();
                Ok(shards)
            }
            Some(Err(err)) => Err(err),
            None => Ok(self.last_listing.lock().unwrap().clone()),
        }
    }

    async fn get_shard_iterator(
        &self,
        _stream_name: &str,
        shard_id: &str,
        _position: StartingPosition,
    ) -> Result<String, ClientError> {
        Ok(format!("{shard_id}:0"))
    }

    async fn get_records(&self, shard_iterator: &str) -> Result<GetRecordsOutput, ClientError> {
        let shard = shard_iterator
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string();
        *self
            .get_records_calls
            .lock()
            .unwrap()
            .entry(shard.clone())
            .or_default() += 1;

        let scripted = self
            .pages
            .lock()
            .unwrap()
            .get_mut(&shard)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| {
            Ok(GetRecordsOutput {
                records: vec![],
                next_shard_iterator: Some(shard_iterator.to_string()),
            })
        })
    }

    async fn register_stream_consumer(
        &self,
        consumer_name: &str,
        stream_arn: &str,
    ) -> Result<RegisteredConsumer, ClientError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        *self.consumer_present.lock().unwrap() = true;
        Ok(RegisteredConsumer {
            consumer_name: consumer_name.to_string(),
            consumer_arn: format!("{stream_arn}/consumer/{consumer_name}:1"),
            status: ConsumerStatus::Creating,
        })
    }

    async fn deregister_stream_consumer(
        &self,
        consumer_name: &str,
        _stream_arn: &str,
    ) -> Result<(), ClientError> {
        self.deregister_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.deregister_error.lock().unwrap().clone() {
            return Err(err);
        }
        let mut present = self.consumer_present.lock().unwrap();
        if !*present {
            return Err(ClientError::ResourceNotFound(format!(
                "consumer {consumer_name} not found"
            )));
        }
        *present = false;
        Ok(())
    }

    async fn describe_stream_consumer(
        &self,
        _lookup: ConsumerLookup,
    ) -> Result<ConsumerStatus, ClientError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.describe_script.lock().unwrap().pop_front() {
            return scripted;
        }
        if let Some(forever) = self.describe_forever.lock().unwrap().clone() {
            return forever;
        }
        if self.consumer_present() {
            Ok(ConsumerStatus::Active)
        } else {
            Err(ClientError::ResourceNotFound("consumer".to_string()))
        }
    }

    async fn subscribe_to_shard(
        &self,
        _consumer_arn: &str,
        shard_id: &str,
        _position: StartingPosition,
    ) -> Result<Box<dyn ShardSubscription>, ClientError> {
        let (tx, events) = mpsc::unbounded_channel();
        let batches = self
            .subscription_records
            .lock()
            .unwrap()
            .remove(shard_id)
            .unwrap_or_default();
        for records in batches {
            tx.send(SubscriptionEvent::Records(records)).unwrap();
        }
        self.open_subscriptions.lock().unwrap().push(tx);

        Ok(Box::new(MockSubscription {
            events,
            closed: Arc::clone(&self.closed_subscriptions),
        }))
    }
}

pub struct MockSubscription {
    events: mpsc::UnboundedReceiver<SubscriptionEvent>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl ShardSubscription for MockSubscription {
    async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out the given mock.
pub fn factory(client: Arc<MockKinesisClient>) -> Arc<dyn ClientFactory> {
    Arc::new(
        move |_: &ClientOptions| -> Result<Arc<dyn KinesisClient>, ClientError> {
            let client: Arc<dyn KinesisClient> = client.clone();
            Ok(client)
        },
    )
}
