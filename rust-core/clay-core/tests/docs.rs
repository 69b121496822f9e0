//! Generated documentation tree.

mod common;

use clay_core::docs::{ClayService, ParamLocation, RequiredState};
use clay_core::{
    attach, Definition, Documenter, Reply, Request, Response, Result, RouteCache, RouteDocs, Service, ServiceDocs,
    ServiceOptions,
};
use common::{Generic, Specific, TestApp};
use serde_json::json;
use std::sync::Arc;

fn param<'a>(service: &'a ClayService, handler: &str, name: &str) -> Option<&'a clay_core::docs::ClayParam> {
    service
        .route(handler)
        .and_then(|route| route.params.iter().find(|param| param.name == name))
}

#[test]
fn test_validated_body_params_documented() {
    let app = TestApp::new();
    let users = app.docs.service("Users").unwrap();

    let name = param(&users, "post", "name").unwrap();
    assert_eq!(name.location, ParamLocation::Body);
    assert_eq!(name.required, RequiredState::Yes);
    assert!(users.route("index").unwrap().params.is_empty());
}

#[test]
fn test_query_and_route_params_documented() {
    let app = TestApp::new();
    let albums = app.docs.service("Albums").unwrap();

    let count = param(&albums, "getMany", "count").unwrap();
    assert_eq!(count.location, ParamLocation::Query);
    assert_eq!(count.required, RequiredState::Yes);

    let id = param(&albums, "getAlbumTitle", "id").unwrap();
    assert_eq!(id.location, ParamLocation::Query);

    let personnel = albums.route("getPersonnel").unwrap();
    assert_eq!(personnel.path, "/albums/:id/personnel/:personnelId");
    let names: Vec<_> = personnel
        .params
        .iter()
        .map(|p| (p.location, p.name.as_str(), p.required))
        .collect();
    assert_eq!(
        names,
        vec![
            (ParamLocation::Route, "id", RequiredState::Yes),
            (ParamLocation::Route, "personnelId", RequiredState::Yes),
        ]
    );
}

#[test]
fn test_rule_requiredness_documented() {
    let app = TestApp::new();
    let search = app.docs.service("Search").unwrap();

    let params: Vec<_> = search
        .route("index")
        .unwrap()
        .params
        .iter()
        .map(|p| (p.name.as_str(), p.required))
        .collect();
    assert_eq!(
        params,
        vec![
            ("search", RequiredState::Yes),
            ("startDate", RequiredState::Yes),
            ("endDate", RequiredState::Yes),
            ("page", RequiredState::No),
            ("itemsPerPage", RequiredState::No),
        ]
    );
}

#[test]
fn test_every_attached_service_published() {
    let app = TestApp::new();
    let names: Vec<_> = app.docs.snapshot().services.into_iter().map(|s| s.name).collect();
    assert_eq!(
        names,
        vec!["Users", "Users", "Comments", "Albums", "Meta", "Secrets", "Search"]
    );
}

fn forwarded_json() -> serde_json::Value {
    json!({
        "name": "Generic",
        "description": "",
        "routes": [{
            "method": "GET",
            "path": "/generic",
            "description": "The description",
            "params": [{
                "type": "query",
                "name": "specificityLevel",
                "required": "NO",
                "description": "How specific does it need to be?",
            }],
            "samples": [],
        }],
    })
}

#[test]
fn test_forwarded_docs_copied() {
    let docs = Documenter::new();
    attach("/specific", Arc::new(Specific::default()), ServiceOptions::new(), &docs).unwrap();
    attach("/generic", Arc::new(Generic::default()), ServiceOptions::new(), &docs).unwrap();

    let generic = docs.service("Generic").unwrap();
    assert_eq!(serde_json::to_value(&generic).unwrap(), forwarded_json());
    assert_eq!(docs.pending_len(), 0);
}

#[test]
fn test_forwarded_docs_resolve_once_target_registers() {
    let docs = Documenter::new();
    attach("/generic", Arc::new(Generic::default()), ServiceOptions::new(), &docs).unwrap();
    assert_eq!(docs.pending_len(), 1);
    assert!(docs.service("Generic").unwrap().route("index").unwrap().is_undocumented());

    attach("/specific", Arc::new(Specific::default()), ServiceOptions::new(), &docs).unwrap();
    assert_eq!(serde_json::to_value(docs.service("Generic").unwrap()).unwrap(), forwarded_json());
    assert_eq!(docs.pending_len(), 0);
}

#[test]
fn test_hidden_target_still_lends_docs() {
    let docs = Documenter::new();
    let hidden = ServiceOptions::new().docs(ServiceDocs::default().hidden());
    attach("/specific", Arc::new(Specific::default()), hidden, &docs).unwrap();
    attach("/generic", Arc::new(Generic::default()), ServiceOptions::new(), &docs).unwrap();

    let published = docs.to_json();
    assert_eq!(published, json!({ "services": [forwarded_json()] }));
}

#[derive(Default)]
struct Opinionated {
    routes: RouteCache<Self>,
}

impl Opinionated {
    async fn index(self: Arc<Self>, req: Request) -> Result<Reply> {
        clay_core::forward(&req, clay_core::RequestOverrides::new()).await
    }

    async fn secret(self: Arc<Self>, _req: Request) -> Result<Reply> {
        Ok(Response::new(204).into())
    }

    async fn post(self: Arc<Self>, _req: Request) -> Result<Reply> {
        Ok(Response::new(201).into())
    }
}

impl Service for Opinionated {
    fn define(def: &mut Definition<Self>) {
        def.endpoint("index", Self::index)
            .forward_to("specific", "index")
            .docs(RouteDocs::new().description("My own words"));
        def.endpoint("secret", Self::secret)
            .route(clay_core::Route::get().path("/secret"))
            .docs(RouteDocs::new().hidden());
        def.endpoint("post", Self::post).docs(
            RouteDocs::new()
                .body_param("title", "What to call it")
                .sample(json!({ "title": "Anything" })),
        );
    }

    fn route_cache(&self) -> &RouteCache<Self> {
        &self.routes
    }
}

#[test]
fn test_own_docs_not_overwritten() {
    let docs = Documenter::new();
    attach("/specific", Arc::new(Specific::default()), ServiceOptions::new(), &docs).unwrap();
    attach("/opinions", Arc::new(Opinionated::default()), ServiceOptions::new(), &docs).unwrap();

    let service = docs.service("Opinionated").unwrap();
    let index = service.route("index").unwrap();
    assert_eq!(index.description, "My own words");
    assert!(index.params.is_empty());
}

#[test]
fn test_route_docs_hide_and_sample() {
    let docs = Documenter::new();
    attach(
        "/opinions",
        Arc::new(Opinionated::default()),
        ServiceOptions::new().docs(ServiceDocs::default().description("Strong views")),
        &docs,
    )
    .unwrap();

    let service = docs.service("Opinionated").unwrap();
    assert_eq!(service.description, "Strong views");
    assert!(service.route("secret").is_none());

    let post = service.route("post").unwrap();
    assert_eq!(post.samples, vec![json!({ "title": "Anything" })]);
    let title = param(&service, "post", "title").unwrap();
    assert_eq!(title.location, ParamLocation::Body);
    assert_eq!(title.required, RequiredState::No);
    assert_eq!(title.description, "What to call it");
}
