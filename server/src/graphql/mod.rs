mod employee;

use std::{path::PathBuf, sync::Arc};

use async_graphql::{Context, ErrorExtensions, Object, Schema, SimpleObject, Subscription};
use platform_api::{ApiError, internal_error};
use products_hr::{AddressBook, DirectoryError, DirectoryModel};
use serde::Serialize;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::{info, instrument};

pub use employee::{
    ContactCardNode, EmployeeNode, GroupBy, RefreshPayload, SectionNode, StatusPayload,
    UpdatePayload,
};

pub type SchemaType = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

/// Address book backed by a JSON file that can be re-read on demand.
#[derive(Clone)]
pub struct AddressBookSource {
    pub book: Arc<AddressBook>,
    pub path: PathBuf,
}

#[derive(Clone)]
pub struct GraphqlData {
    pub model: Arc<DirectoryModel>,
    pub address_book: Option<AddressBookSource>,
}

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(data)
        .finish()
}

fn graphql_data<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a GraphqlData> {
    ctx.data::<GraphqlData>()
}

fn directory_error(err: DirectoryError) -> async_graphql::Error {
    match err {
        DirectoryError::Fetch { .. } | DirectoryError::Decode { .. } => {
            ApiError::unavailable(err.to_string()).extend()
        }
        DirectoryError::CacheDisabled => ApiError::unavailable(err.to_string()).extend(),
        other => internal_error(other),
    }
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.health", skip_all)]
    async fn health(&self) -> HealthPayload {
        HealthPayload { ok: true }
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Flat, sorted employee list, optionally filtered.
    #[instrument(name = "graphql.employees", skip_all)]
    async fn employees(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
    ) -> async_graphql::Result<Vec<EmployeeNode>> {
        let store = graphql_data(ctx)?.model.store();
        let employees = match search {
            Some(query) => store.search(&query).await,
            None => store.snapshot().await.to_vec(),
        };
        Ok(employees.iter().map(EmployeeNode::from).collect())
    }

    #[instrument(name = "graphql.sections", skip_all)]
    async fn sections(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] group_by: GroupBy,
    ) -> async_graphql::Result<Vec<SectionNode>> {
        let groups = graphql_data(ctx)?
            .model
            .store()
            .grouped(group_by.into())
            .await;
        Ok(groups
            .iter()
            .map(|(key, employees)| SectionNode::new(key, employees))
            .collect())
    }

    #[instrument(name = "graphql.employee", skip_all)]
    async fn employee(
        &self,
        ctx: &Context<'_>,
        key: String,
    ) -> async_graphql::Result<Option<EmployeeNode>> {
        let employee = graphql_data(ctx)?.model.store().find(&key).await;
        Ok(employee.as_ref().map(EmployeeNode::from))
    }

    #[instrument(name = "graphql.contact_card", skip_all)]
    async fn contact_card(
        &self,
        ctx: &Context<'_>,
        key: String,
    ) -> async_graphql::Result<Option<ContactCardNode>> {
        let model = &graphql_data(ctx)?.model;
        let employee = model
            .store()
            .find(&key)
            .await
            .ok_or_else(|| ApiError::NotFound.extend())?;
        let record = model
            .contact_record(&employee)
            .await
            .map_err(directory_error)?;
        Ok(record.map(ContactCardNode::from))
    }

    #[instrument(name = "graphql.status", skip_all)]
    async fn status(&self, ctx: &Context<'_>) -> async_graphql::Result<StatusPayload> {
        let model = &graphql_data(ctx)?.model;
        Ok(StatusPayload {
            phase: model.phase().into(),
            is_data_cached: model.is_data_cached(),
            employees: model.store().len().await,
        })
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Fetch every source again. Failures leave the current roster in place.
    #[instrument(name = "graphql.refresh", skip_all)]
    async fn refresh(&self, ctx: &Context<'_>) -> async_graphql::Result<RefreshPayload> {
        let model = &graphql_data(ctx)?.model;
        model
            .refresh()
            .await
            .map(RefreshPayload::from)
            .map_err(directory_error)
    }

    /// Re-read the address book and re-link the cached roster.
    #[instrument(name = "graphql.contacts_changed", skip_all)]
    async fn contacts_changed(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Option<usize>> {
        let data = graphql_data(ctx)?;
        if let Some(source) = &data.address_book {
            let book = Arc::clone(&source.book);
            let path = source.path.clone();
            let count = tokio::task::spawn_blocking(move || book.reload(&path))
                .await
                .map_err(internal_error)?
                .map_err(internal_error)?;
            info!(count, "address book reloaded");
        }
        data.model
            .contacts_did_change()
            .await
            .map_err(directory_error)
    }
}

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Emits after every store replacement. Slow subscribers skip missed
    /// events.
    async fn directory_updated(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<impl Stream<Item = UpdatePayload>> {
        let receiver = graphql_data(ctx)?.model.store().subscribe();
        Ok(BroadcastStream::new(receiver)
            .filter_map(|event| event.ok().map(UpdatePayload::from)))
    }
}

#[derive(Clone, Debug, SimpleObject, Serialize)]
pub struct HealthPayload {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::{Request, Variables};
    use products_hr::{DirectoryConfig, Employee, NoContacts, Position, UpdateOrigin};
    use serde_json::json;
    use std::time::Duration;

    fn test_data() -> GraphqlData {
        let config = DirectoryConfig::new(Vec::new()).with_cache(None);
        GraphqlData {
            model: Arc::new(DirectoryModel::new(config, Arc::new(NoContacts))),
            address_book: None,
        }
    }

    async fn seeded() -> (GraphqlData, SchemaType) {
        let data = test_data();
        data.model
            .store()
            .replace(
                vec![
                    Employee::new("Mart", "Kask").with_position(Position::Web),
                    Employee::new("Kati", "Karu").with_position(Position::Ios),
                    Employee::new("Liis", "Tamm").with_position(Position::Web),
                ],
                UpdateOrigin::Cache,
            )
            .await;
        let schema = build_schema(data.clone());
        (data, schema)
    }

    #[tokio::test]
    async fn health_query_returns_ok() {
        let schema = build_schema(test_data());
        let response = schema.execute(Request::new("{ health { ok } }")).await;
        assert!(response.errors.is_empty());
        let body = response.data.into_json().unwrap();
        assert_eq!(body, json!({"health": {"ok": true}}));
    }

    #[tokio::test]
    async fn sections_group_by_position() {
        let (_, schema) = seeded().await;
        let query = "{ sections(groupBy: POSITION) { title employees { fullName position } } }";
        let response = schema.execute(Request::new(query)).await;
        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        let body = response.data.into_json().unwrap();
        assert_eq!(
            body["sections"],
            json!([
                {"title": "iOS Developer", "employees": [
                    {"fullName": "Kati Karu", "position": "IOS"}
                ]},
                {"title": "Web Developer", "employees": [
                    {"fullName": "Mart Kask", "position": "WEB"},
                    {"fullName": "Liis Tamm", "position": "WEB"}
                ]}
            ])
        );
    }

    #[tokio::test]
    async fn employees_can_be_searched() {
        let (_, schema) = seeded().await;
        let query = r#"
            query Search($term: String) {
                employees(search: $term) { key fullName }
            }
        "#;
        let vars = Variables::from_json(json!({ "term": "ka" }));
        let response = schema.execute(Request::new(query).variables(vars)).await;
        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        let body = response.data.into_json().unwrap();
        assert_eq!(
            body["employees"],
            json!([
                {"key": "karu.kati", "fullName": "Kati Karu"},
                {"key": "kask.mart", "fullName": "Mart Kask"}
            ])
        );
    }

    #[tokio::test]
    async fn contact_card_for_unknown_employee_is_not_found() {
        let (_, schema) = seeded().await;
        let response = schema
            .execute(Request::new(r#"{ contactCard(key: "nobody.here") { identifier } }"#))
            .await;
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].message, "resource not found");

        let response = schema
            .execute(Request::new(r#"{ contactCard(key: "karu.kati") { identifier } }"#))
            .await;
        assert!(response.errors.is_empty());
        assert_eq!(response.data.into_json().unwrap(), json!({"contactCard": null}));
    }

    #[tokio::test]
    async fn contacts_changed_without_cache_is_a_no_op() {
        let (_, schema) = seeded().await;
        let response = schema.execute(Request::new("mutation { contactsChanged }")).await;
        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        assert_eq!(response.data.into_json().unwrap(), json!({"contactsChanged": null}));
    }

    #[tokio::test]
    async fn status_reports_store_size() {
        let (_, schema) = seeded().await;
        let response = schema
            .execute(Request::new("{ status { phase isDataCached employees } }"))
            .await;
        let body = response.data.into_json().unwrap();
        assert_eq!(
            body["status"],
            json!({"phase": "IDLE", "isDataCached": false, "employees": 3})
        );
    }

    #[tokio::test]
    async fn subscription_streams_store_updates() {
        let (data, schema) = seeded().await;
        let subscription = "subscription { directoryUpdated { origin employees } }";
        let mut stream = schema.execute_stream(Request::new(subscription));

        let writer = tokio::spawn(async move {
            for _ in 0..100 {
                data.model
                    .store()
                    .replace(vec![Employee::new("Solo", "Entry")], UpdateOrigin::Remote)
                    .await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        let response = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("subscription produced no event")
            .expect("subscription ended");
        writer.abort();
        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"directoryUpdated": {"origin": "REMOTE", "employees": 1}})
        );
    }
}
