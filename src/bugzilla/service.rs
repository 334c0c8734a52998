use crate::bugzilla::dispatch::{attach_facets, Facets};
use crate::bugzilla::identity::Suffix;
use crate::bugzilla::model::{Attachment, Bug, BugUpdate, Comment, Event, ReadMode};
use crate::bugzilla::request::{
    AddAttachmentParams, AddAttachmentRequest, AttachmentsByIdRequest, AttachmentsParams,
    AttachmentsRequest, CommentsParams, CommentsRequest, CreateParams, CreateRequest,
    ExtensionsRequest, FieldsRequest, GetParams, GetRequest, HistoryParams, HistoryRequest,
    ModifyParams, ModifyRequest, Product, ProductsRequest, Request, SearchParams, SearchRequest,
    Selector, User, UsersRequest, VersionRequest,
};
use crate::config::Connection;
use crate::error::{Error, Result};
use crate::rpc::{self, Credentials, Transport, TransportOptions, WireRequest};
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

/// A connection to one Bugzilla instance.
///
/// Cheap to clone; clones share the transport, the session credentials and
/// the worker pool bounding concurrent calls.
#[derive(Clone)]
pub struct Service {
    transport: Arc<dyn Transport>,
    suffix: Suffix,
    pool: Arc<Semaphore>,
}

impl Service {
    pub fn new(transport: Arc<dyn Transport>, suffix: Suffix, concurrent: usize) -> Self {
        Self {
            transport,
            suffix,
            pool: Arc::new(Semaphore::new(concurrent.max(1))),
        }
    }

    /// Build a service from a configured connection.
    pub fn connect(connection: &Connection) -> Result<Self> {
        let base = connection
            .base
            .as_deref()
            .ok_or_else(|| Error::Config("no base URL configured".into()))?;
        let options = TransportOptions {
            timeout: Duration::from_secs(connection.timeout),
            verify: connection.verify,
            concurrent: connection.concurrent,
        };
        let transport = rpc::connect(base, connection.service, &options)?;
        debug!(endpoint = %transport.endpoint(), dialect = %connection.service, "connected");
        Ok(Self::new(
            transport,
            Suffix::new(connection.suffix.clone()),
            connection.concurrent,
        ))
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn suffix(&self) -> &Suffix {
        &self.suffix
    }

    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        self.transport.set_credentials(credentials);
    }

    pub async fn login(&self, user: &str, password: &str, restrict: bool) -> Result<Credentials> {
        self.transport.login(user, password, restrict).await
    }

    /// The HTTP request a builder would send, for dry runs.
    pub fn preview<R: Request>(&self, request: &R) -> Result<WireRequest> {
        self.transport.create_request(request.call())
    }

    /// Send one request through the worker pool and parse the reply.
    pub async fn send<R: Request>(&self, request: &R) -> Result<R::Output> {
        let _permit = self
            .pool
            .acquire()
            .await
            .map_err(|_| Error::Transport("worker pool closed".into()))?;
        let call = request.call();
        debug!(
            method = call.method,
            dialect = %self.transport.dialect(),
            endpoint = %self.transport.endpoint(),
            "rpc call"
        );
        let data = self.transport.call(call).await?;
        trace!(method = call.method, reply = %data, "rpc reply");
        request.parse(data)
    }

    async fn send_optional<R: Request>(&self, request: Option<&R>) -> Result<Option<R::Output>> {
        match request {
            Some(request) => self.send(request).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn search(&self, params: &SearchParams) -> Result<Vec<Bug>> {
        self.send(&SearchRequest::new(params, &self.suffix)?).await
    }

    /// Fetch bugs, with any requested facets fetched in parallel.
    pub async fn get(&self, params: &GetParams) -> Result<Vec<Bug>> {
        let base = GetRequest::new(params)?;
        let attachments = params
            .attachments
            .then(|| {
                AttachmentsRequest::new(&AttachmentsParams {
                    ids: params.ids.clone(),
                    ..Default::default()
                })
            })
            .transpose()?;
        let comments = params
            .comments
            .then(|| {
                CommentsRequest::new(&CommentsParams {
                    ids: params.ids.clone(),
                    ..Default::default()
                })
            })
            .transpose()?;
        let history = params
            .history
            .then(|| {
                HistoryRequest::new(&HistoryParams {
                    ids: params.ids.clone(),
                    since: None,
                })
            })
            .transpose()?;

        let (bugs, attachments, comments, history) = tokio::try_join!(
            self.send(&base),
            self.send_optional(attachments.as_ref()),
            self.send_optional(comments.as_ref()),
            self.send_optional(history.as_ref()),
        )?;
        Ok(attach_facets(
            bugs,
            &params.ids,
            Facets {
                attachments,
                comments,
                history,
            },
        ))
    }

    pub async fn modify(&self, params: &ModifyParams) -> Result<Vec<BugUpdate>> {
        self.send(&ModifyRequest::new(params, &self.suffix)?).await
    }

    /// Create a bug, returning its id.
    pub async fn create(&self, params: &CreateParams) -> Result<u64> {
        self.send(&CreateRequest::new(params, &self.suffix)?).await
    }

    pub async fn comments(&self, params: &CommentsParams) -> Result<Vec<Vec<Comment>>> {
        self.send(&CommentsRequest::new(params)?).await
    }

    pub async fn history(&self, params: &HistoryParams) -> Result<Vec<Vec<Event>>> {
        self.send(&HistoryRequest::new(params)?).await
    }

    pub async fn attachments(&self, params: &AttachmentsParams) -> Result<Vec<Vec<Attachment>>> {
        self.send(&AttachmentsRequest::new(params)?).await
    }

    pub async fn attachments_by_id(&self, ids: &[u64], with_data: bool) -> Result<Vec<Attachment>> {
        self.send(&AttachmentsByIdRequest::new(ids, with_data)?).await
    }

    /// Attachment payload, fetched from the server unless already loaded.
    pub async fn read_attachment(&self, attachment: &Attachment, mode: ReadMode) -> Result<Vec<u8>> {
        if attachment.has_data() {
            return attachment.read(mode);
        }
        let fetched = self.attachments_by_id(&[attachment.id], true).await?;
        fetched
            .first()
            .ok_or_else(|| Error::NotFound(format!("attachment {} does not exist", attachment.id)))?
            .read(mode)
    }

    /// Payloads of several attachments, fetched concurrently.
    pub async fn read_attachments(&self, attachments: &[Attachment], mode: ReadMode) -> Result<Vec<Vec<u8>>> {
        try_join_all(attachments.iter().map(|a| self.read_attachment(a, mode))).await
    }

    /// Attach a file to bugs, returning the new attachment ids.
    pub async fn add_attachment(&self, params: &AddAttachmentParams) -> Result<Vec<u64>> {
        self.send(&AddAttachmentRequest::new(params)?).await
    }

    pub async fn version(&self) -> Result<String> {
        self.send(&VersionRequest::new()).await
    }

    pub async fn extensions(&self) -> Result<BTreeMap<String, String>> {
        self.send(&ExtensionsRequest::new()).await
    }

    pub async fn fields(&self, selector: &Selector) -> Result<Vec<Value>> {
        self.send(&FieldsRequest::new(selector)?).await
    }

    pub async fn products(&self, selector: &Selector) -> Result<Vec<Product>> {
        self.send(&ProductsRequest::new(selector)?).await
    }

    pub async fn users(&self, selector: &Selector) -> Result<Vec<User>> {
        self.send(&UsersRequest::new(selector)?).await
    }
}
