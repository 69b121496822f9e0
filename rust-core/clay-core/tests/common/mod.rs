//! Fixture services shared by the integration tests.

#![allow(dead_code)]

use clay_core::server::Bytes;
use clay_core::{
    attach, Condition, Context, Documenter, Error, HostContext, Method, MiddlewareChain, Policy, PolicyChecks,
    PolicyDenial, Reply, Request, Response, Result, Route, RouteCache, Rule, Server, Service, ServiceOptions,
    Validatable, ValidationSchema,
};
use clay_core::{Definition, RequestOverrides};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Users {
    routes: RouteCache<Self>,
    users: Mutex<Vec<Value>>,
}

impl Users {
    async fn get(self: Arc<Self>, req: Request) -> Result<Reply> {
        let id = req.param("id").and_then(|id| id.parse::<u64>().ok());
        let user = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user["id"].as_u64() == id)
            .cloned();
        Ok(Response::ok(json!({ "user": user })).into())
    }

    async fn index(self: Arc<Self>, _req: Request) -> Result<Reply> {
        let users = self.users.lock().unwrap().clone();
        Ok(Response::ok(json!({ "users": users })).into())
    }

    async fn post(self: Arc<Self>, req: Request) -> Result<Reply> {
        let mut users = self.users.lock().unwrap();
        let user = json!({
            "id": users.len() + 1,
            "name": req.body_field("name").cloned().unwrap_or(Value::Null),
            "createdAt": req.state().get("createdAt"),
        });
        users.push(user.clone());
        Ok(Response::ok(json!({ "user": user })).into())
    }

    async fn stamp(req: Request, _users: Arc<Self>) -> Result<()> {
        req.state().set("createdAt", "2020-11-13T00:00:00Z");
        Ok(())
    }

    async fn metadata(_req: Request, reply: Arc<Reply>, _users: Arc<Self>) -> Result<Option<Reply>> {
        let mut body = reply.body().cloned().unwrap_or_else(|| json!({}));
        body["metadata"] = json!({ "source": "users" });
        Ok(Some(Response::new(reply.status()).with_body(body).into()))
    }
}

impl Service for Users {
    fn define(def: &mut Definition<Self>) {
        def.endpoint("get", Self::get).after(Self::metadata);
        def.endpoint("index", Self::index).after(Self::metadata);
        def.endpoint("post", Self::post)
            .validate(ValidationSchema::new().body(Validatable::keys(["name"])))
            .before(Self::stamp);
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Comments {
    routes: RouteCache<Self>,
    comments: Mutex<Vec<Value>>,
    pub notified: Mutex<Vec<String>>,
    pub reply_was_mutable: AtomicBool,
}

impl Comments {
    async fn post(self: Arc<Self>, req: Request) -> Result<Reply> {
        let mut comments = self.comments.lock().unwrap();
        let comment = json!({
            "id": comments.len() + 1,
            "title": req.body_field("title"),
            "text": req.body_field("text"),
        });
        comments.push(comment.clone());
        Ok(Response::ok(json!({ "comment": comment })).into())
    }

    async fn get_many(self: Arc<Self>, _req: Request) -> Result<Reply> {
        let comments = self.comments.lock().unwrap().clone();
        Ok(Response::ok(json!({ "comments": comments })).into())
    }

    async fn get_one(self: Arc<Self>, _req: Request) -> Result<Reply> {
        let first = self.comments.lock().unwrap().first().cloned();
        Ok(Response::ok(json!({ "comment": first })).into())
    }

    async fn delete(self: Arc<Self>, _req: Request) -> Result<Reply> {
        Ok(Response::new(204).into())
    }

    async fn notify_everyone(req: Request, _reply: Arc<Reply>, comments: Arc<Self>) -> Result<Option<Reply>> {
        let title = req.body_field("title").and_then(Value::as_str).unwrap_or_default();
        comments.notified.lock().unwrap().push(title.to_string());
        Ok(None)
    }

    async fn try_to_mutate(_req: Request, mut reply: Arc<Reply>, comments: Arc<Self>) -> Result<Option<Reply>> {
        if let Some(Reply::Response(res)) = Arc::get_mut(&mut reply) {
            res.body = Some(json!({ "metadata": "mutated" }));
            comments.reply_was_mutable.store(true, Ordering::SeqCst);
        }
        Ok(None)
    }
}

impl Service for Comments {
    fn define(def: &mut Definition<Self>) {
        def.routes([
            Route::post(),
            Route::get().path("/:id").handler("getOne"),
            Route::get().handler("getMany"),
            Route::delete(),
        ]);
        def.endpoint("post", Self::post).after(Self::notify_everyone);
        def.endpoint("getMany", Self::get_many).after(Self::try_to_mutate);
        def.endpoint("getOne", Self::get_one);
        def.endpoint("delete", Self::delete);
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

// ---------------------------------------------------------------------------
// Albums
// ---------------------------------------------------------------------------

/// Public view of an album
#[derive(Serialize, Deserialize)]
pub struct AlbumTitle {
    id: u64,
    title: String,
}

pub struct Albums {
    routes: RouteCache<Self>,
    albums: Vec<Value>,
}

impl Default for Albums {
    fn default() -> Self {
        Self {
            routes: RouteCache::new(),
            albums: vec![
                json!({ "id": 0, "title": "McCartney I", "artist": "Paul McCartney" }),
                json!({ "id": 1, "title": "McCartney II", "artist": "Paul McCartney" }),
                json!({
                    "id": 2,
                    "title": "McCartney III",
                    "artist": "Paul McCartney",
                    "personnel": [
                        { "id": 0, "name": "Steve Orchard" },
                        { "id": 1, "name": "Greg Kurstin" },
                        { "id": 2, "name": "Keith Smith" }
                    ]
                }),
            ],
        }
    }
}

impl Albums {
    fn find(&self, id: Option<&str>) -> Option<&Value> {
        let id = id.and_then(|id| id.parse::<u64>().ok())?;
        self.albums.iter().find(|album| album["id"].as_u64() == Some(id))
    }

    async fn get(self: Arc<Self>, req: Request) -> Result<Reply> {
        let album = self
            .find(req.param("id"))
            .ok_or_else(|| Error::http(404, "Album not found"))?;
        Ok(Response::ok(json!({ "album": album })).into())
    }

    async fn get_personnel(self: Arc<Self>, req: Request) -> Result<Reply> {
        let album = self.find(req.param("id"));
        let personnel = album.and_then(|album| {
            let wanted = req.param("personnelId")?.parse::<u64>().ok()?;
            album["personnel"]
                .as_array()?
                .iter()
                .find(|p| p["id"].as_u64() == Some(wanted))
        });
        match (album, personnel) {
            (Some(album), Some(personnel)) => {
                Ok(Response::ok(json!({ "album": album, "personnel": personnel })).into())
            }
            _ => Err(Error::http(404, "Album/personnel not found")),
        }
    }

    async fn get_many(self: Arc<Self>, req: Request) -> Result<Reply> {
        let count = req
            .query_param("count")
            .and_then(|count| count.parse::<usize>().ok())
            .unwrap_or(0);
        let albums: Vec<_> = self.albums.iter().take(count).cloned().collect();
        Ok(Response::ok(json!({ "albums": albums })).into())
    }

    async fn get_album_titles(self: Arc<Self>, _req: Request) -> Result<Reply> {
        Ok(Response::ok(json!({ "albums": self.albums })).into())
    }

    async fn get_album_title(self: Arc<Self>, req: Request) -> Result<Reply> {
        let album = self
            .find(req.query_param("id"))
            .ok_or_else(|| Error::http(404, "Album not found"))?;
        Ok(Response::ok(json!({ "album": album })).into())
    }

    async fn edit_review(&self, req: &Request) -> Result<Reply> {
        Ok(Response::ok(json!({
            "album": req.param("id"),
            "review": req.param("reviewId"),
            "edited": true,
        }))
        .into())
    }
}

impl Service for Albums {
    fn define(def: &mut Definition<Self>) {
        def.routes([
            Route::get().path("/titles").handler("getAlbumTitles"),
            Route::get().path("/title").handler("getAlbumTitle"),
            Route::get().path("/:id"),
            Route::get().path("/:id/personnel/:personnelId").handler("getPersonnel"),
            Route::get().handler("getMany"),
            Route::post().path("/:id/reviews").factory(|_albums: Arc<Self>| {
                |req: Request| async move { Ok(Reply::from(Response::ok(json!({ "review": req.body().clone() })))) }
            }),
            Route::put().path("/:id/reviews/:reviewId").factory(|albums: Arc<Self>| {
                move |req: Request| {
                    let albums = Arc::clone(&albums);
                    async move { albums.edit_review(&req).await }
                }
            }),
        ]);
        def.endpoint("get", Self::get);
        def.endpoint("getPersonnel", Self::get_personnel);
        def.endpoint("getMany", Self::get_many)
            .validate(ValidationSchema::new().query(Validatable::rules([(
                "count",
                Rule::required().error("Count not specified"),
            )])));
        def.endpoint("getAlbumTitles", Self::get_album_titles)
            .resource::<AlbumTitle>("albums");
        def.endpoint("getAlbumTitle", Self::get_album_title)
            .validate(ValidationSchema::new().query(Validatable::keys(["id"])))
            .resource::<AlbumTitle>("album");
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Meta {
    routes: RouteCache<Self>,
}

impl Meta {
    async fn index(self: Arc<Self>, req: Request) -> Result<Reply> {
        let services = req.state().get("services").unwrap_or_else(|| json!({}));
        Ok(Response::ok(json!({ "services": services })).into())
    }
}

impl Service for Meta {
    fn define(def: &mut Definition<Self>) {
        def.endpoint("index", Self::index);
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

pub struct SecretsPolicy {
    ctx: HostContext,
}

impl Policy for SecretsPolicy {
    fn from_context(ctx: &HostContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    fn checks(checks: &mut PolicyChecks<Self>) {
        checks
            .check("index", |_policy, req: Request| async move { req.query_param("scope") == Some("get") })
            .check("post", |policy: Arc<Self>, _req| async move {
                policy.ctx.state().get("key") == Some(json!("abc123"))
            })
            .check("put", |_policy, _req| async {
                PolicyDenial::new(json!({ "message": "Method not implemented yet. Come back later" })).with_status(405)
            });
    }
}

#[derive(Default)]
pub struct Secrets {
    routes: RouteCache<Self>,
}

impl Secrets {
    async fn no_content(self: Arc<Self>, _req: Request) -> Result<Reply> {
        Ok(Response::new(204).into())
    }

    async fn store_key(req: Request, _secrets: Arc<Self>) -> Result<()> {
        if let Some(key) = req.body_field("key") {
            req.state().set("key", key.clone());
        }
        Ok(())
    }
}

impl Service for Secrets {
    fn define(def: &mut Definition<Self>) {
        def.endpoint("index", Self::no_content)
            .has_permission::<SecretsPolicy>("index");
        def.endpoint("post", Self::no_content)
            .before(Self::store_key)
            .has_permission::<SecretsPolicy>("post");
        def.endpoint("put", Self::no_content)
            .has_permission::<SecretsPolicy>("put");
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Search {
    routes: RouteCache<Self>,
}

impl Search {
    async fn index(self: Arc<Self>, _req: Request) -> Result<Reply> {
        Ok(Response::new(204).into())
    }
}

fn is_number(value: &Value) -> bool {
    value.as_str().map_or(value.is_number(), |s| s.parse::<f64>().is_ok())
}

impl Service for Search {
    fn define(def: &mut Definition<Self>) {
        def.endpoint("index", Self::index).validate(ValidationSchema::new().query(Validatable::rules([
            ("search", Rule::required()),
            ("startDate", Rule::required().error("Bad start date")),
            (
                "endDate",
                Rule::required().validation(|value: Value, _req: Request| async move {
                    vec![Condition::new(is_number(&value)).error("Bad end date")]
                }),
            ),
            ("page", Rule::new()),
            (
                "itemsPerPage",
                Rule::new().validation(|value: Value, _req: Request| async move {
                    vec![Condition::new(is_number(&value))]
                }),
            ),
        ])));
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

// ---------------------------------------------------------------------------
// Forwarding pair
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Specific {
    routes: RouteCache<Self>,
}

impl Specific {
    async fn index(self: Arc<Self>, req: Request) -> Result<Reply> {
        Ok(Response::ok(json!({
            "specificityLevel": req.query_param("specificityLevel"),
            "path": req.path(),
        }))
        .into())
    }
}

impl Service for Specific {
    fn define(def: &mut Definition<Self>) {
        def.endpoint("index", Self::index).route(Route::get().docs(
            clay_core::RouteDocs::new()
                .description("The description")
                .query_param("specificityLevel", "How specific does it need to be?"),
        ));
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

#[derive(Default)]
pub struct Generic {
    routes: RouteCache<Self>,
}

impl Generic {
    async fn index(self: Arc<Self>, req: Request) -> Result<Reply> {
        clay_core::forward(&req, RequestOverrides::new().query([("specificityLevel", "specific")])).await
    }
}

impl Service for Generic {
    fn define(def: &mut Definition<Self>) {
        def.endpoint("index", Self::index)
            .route(Route::get())
            .forward_to("specific", "index");
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// The fixture app: every service attached the way a host would mount them
pub struct TestApp {
    pub server: Server,
    pub docs: Documenter,
    pub comments: Arc<Comments>,
}

impl TestApp {
    pub fn new() -> Self {
        let docs = Documenter::new();
        let comments = Arc::new(Comments::default());
        let opts = ServiceOptions::new;

        let chain = MiddlewareChain::new()
            .with(attach("/users", Arc::new(Users::default()), opts(), &docs).unwrap())
            .with(attach("/api/users", Arc::new(Users::default()), opts(), &docs).unwrap())
            .with(attach("/comments", Arc::clone(&comments), opts(), &docs).unwrap())
            .with(attach("/albums", Arc::new(Albums::default()), opts(), &docs).unwrap())
            .with(attach("/meta", Arc::new(Meta::default()), opts(), &docs).unwrap())
            .with(attach("/secrets", Arc::new(Secrets::default()), opts(), &docs).unwrap())
            .with(attach("/search", Arc::new(Search::default()), opts(), &docs).unwrap());

        Self {
            server: Server::new(chain),
            docs,
            comments,
        }
    }

    pub async fn request(&self, method: Method, target: &str, headers: &[(&str, &str)], body: Option<Value>) -> Context {
        let headers: BTreeMap<String, String> = headers
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        let body = body.map(|body| Bytes::from(serde_json::to_vec(&body).unwrap()));
        self.server.test_request(method, target, headers, body).await
    }

    pub async fn get(&self, target: &str) -> Context {
        self.request(Method::Get, target, &[], None).await
    }

    pub async fn send(&self, method: Method, target: &str, body: Value) -> Context {
        self.request(method, target, &[], Some(body)).await
    }
}

/// Run a bare chain over a context
pub async fn run(chain: &MiddlewareChain, mut ctx: Context) -> Context {
    chain.handle(&mut ctx).await;
    ctx
}
