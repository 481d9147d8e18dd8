//! OpenAPI description of the generated routes.
//!
//! The document is assembled with utoipa's builders from the same route table the
//! router is built from, so the two never drift apart. Every response is HTTP 200
//! and is described as the envelope `{base: {success: ..} | {errors: [..]}}`.

use crate::generator::{Endpoints, Operation, Route};
use crate::schema::{Field, FieldType, ModelSchema};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::openapi::path::{
    HttpMethod, OperationBuilder, Parameter, ParameterBuilder, ParameterIn, PathItem,
    PathItemBuilder,
};
use utoipa::openapi::request_body::{RequestBody, RequestBodyBuilder};
use utoipa::openapi::response::ResponseBuilder;
use utoipa::openapi::schema::{
    Array, KnownFormat, ObjectBuilder, OneOfBuilder, Schema, SchemaFormat, SchemaType, Type,
};
use utoipa::openapi::{
    ContentBuilder, InfoBuilder, OpenApi, OpenApiBuilder, PathsBuilder, RefOr, Required,
};

/// Build the document for every set of endpoints.
#[must_use]
pub fn document(title: &str, version: &str, endpoints: &[Arc<Endpoints>]) -> OpenApi {
    let mut paths = PathsBuilder::new();
    for endpoints in endpoints {
        for (path, item) in path_items(endpoints) {
            paths = paths.path(path, item);
        }
    }

    OpenApiBuilder::new()
        .info(InfoBuilder::new().title(title).version(version).build())
        .paths(paths.build())
        .build()
}

/// One path item per distinct path of a model's route table.
fn path_items(endpoints: &Endpoints) -> BTreeMap<String, PathItem> {
    let mut grouped: BTreeMap<String, Vec<Route>> = BTreeMap::new();
    for route in endpoints.routes() {
        grouped.entry(route.path.clone()).or_default().push(route);
    }

    grouped
        .into_iter()
        .map(|(path, routes)| {
            let item = routes.iter().fold(PathItemBuilder::new(), |item, route| {
                item.operation(http_method(route.operation), operation(endpoints, route))
            });
            (path, item.build())
        })
        .collect()
}

fn http_method(operation: Operation) -> HttpMethod {
    match operation {
        Operation::Create => HttpMethod::Post,
        Operation::Read => HttpMethod::Get,
        Operation::Update => HttpMethod::Put,
        Operation::Delete => HttpMethod::Delete,
    }
}

fn operation(endpoints: &Endpoints, route: &Route) -> utoipa::openapi::path::Operation {
    let schema = endpoints.schema();
    let base = endpoints.base();
    let (verb, summary, data) = match (route.operation, route.keyed) {
        (Operation::Create, _) => (
            "create",
            format!("Create a {}", schema.name()),
            record_schema(schema),
        ),
        (Operation::Read, false) => (
            "read",
            format!(
                "List every {0}, or one {0} when `{1}` is given",
                schema.name(),
                endpoints.primary_key()
            ),
            Schema::OneOf(
                OneOfBuilder::new()
                    .item(record_schema(schema))
                    .item(Schema::Array(Array::new(record_schema(schema))))
                    .build(),
            ),
        ),
        (Operation::Read, true) => (
            "read_one",
            format!("Read one {} by key", schema.name()),
            record_schema(schema),
        ),
        (Operation::Update, _) => (
            if route.keyed { "update_one" } else { "update" },
            format!("Update a {}", schema.name()),
            record_schema(schema),
        ),
        (Operation::Delete, _) => (
            if route.keyed { "delete_one" } else { "delete" },
            format!("Delete a {} and return it", schema.name()),
            record_schema(schema),
        ),
    };

    let mut builder = OperationBuilder::new()
        .tag(base)
        .operation_id(Some(format!("{verb}_{base}")))
        .summary(Some(summary))
        .response(
            "200",
            RefOr::T(
                ResponseBuilder::new()
                    .description(format!("`{base}` envelope holding either the data or the errors"))
                    .content(
                        "application/json",
                        ContentBuilder::new()
                            .schema(Some(envelope_schema(base, data)))
                            .build(),
                    )
                    .build(),
            ),
        );

    let pk = schema.primary_key();
    if route.keyed {
        builder = builder.parameter(key_parameter(pk, ParameterIn::Path, Required::True));
    } else if route.operation != Operation::Create {
        builder = builder.parameter(key_parameter(pk, ParameterIn::Query, Required::False));
    }

    let body = match route.operation {
        Operation::Create => Some(fields_body(schema, "Fields of the new record")),
        Operation::Update => Some(fields_body(schema, "Fields to change")),
        Operation::Read | Operation::Delete => None,
    };
    builder.request_body(body).build()
}

fn key_parameter(pk: &Field, location: ParameterIn, required: Required) -> Parameter {
    ParameterBuilder::new()
        .name(pk.name())
        .parameter_in(location)
        .required(required)
        .schema(Some(field_schema(pk)))
        .description(Some("Primary key of the record"))
        .build()
}

/// Mutable fields as an optional JSON object; query parameters are accepted too.
fn fields_body(schema: &ModelSchema, description: &str) -> RequestBody {
    let object = schema
        .mutable_fields()
        .fold(ObjectBuilder::new().schema_type(SchemaType::Type(Type::Object)), |object, field| {
            object.property(field.name(), field_schema(field))
        });

    RequestBodyBuilder::new()
        .description(Some(description))
        .content(
            "application/json",
            ContentBuilder::new()
                .schema(Some(Schema::Object(object.build())))
                .build(),
        )
        .required(Some(Required::False))
        .build()
}

fn record_schema(schema: &ModelSchema) -> Schema {
    let object = schema.fields().iter().fold(
        ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::Object))
            .title(Some(schema.name())),
        |object, field| object.property(field.name(), field_schema(field)),
    );
    Schema::Object(object.build())
}

fn field_schema(field: &Field) -> Schema {
    let object = match field.kind() {
        FieldType::Integer => ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::Integer))
            .format(Some(SchemaFormat::KnownFormat(KnownFormat::Int64))),
        FieldType::Float => ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::Number))
            .format(Some(SchemaFormat::KnownFormat(KnownFormat::Double))),
        FieldType::Text => ObjectBuilder::new().schema_type(SchemaType::Type(Type::String)),
        FieldType::Boolean => ObjectBuilder::new().schema_type(SchemaType::Type(Type::Boolean)),
        FieldType::Uuid => ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::String))
            .format(Some(SchemaFormat::Custom("uuid".to_string()))),
    };
    let object = match field.foreign_key() {
        Some(target) => object.description(Some(format!("Key of a {}", target.name()))),
        None => object,
    };
    Schema::Object(object.build())
}

fn scalar(kind: Type) -> Schema {
    Schema::Object(ObjectBuilder::new().schema_type(SchemaType::Type(kind)).build())
}

fn envelope_schema(base: &str, data: Schema) -> Schema {
    let success = ObjectBuilder::new()
        .schema_type(SchemaType::Type(Type::Object))
        .property("success", data)
        .required("success");

    let entry = ObjectBuilder::new()
        .schema_type(SchemaType::Type(Type::Object))
        .property("message", scalar(Type::String))
        .property("code", scalar(Type::Integer))
        .required("message")
        .required("code");
    let errors = ObjectBuilder::new()
        .schema_type(SchemaType::Type(Type::Object))
        .property("errors", Schema::Array(Array::new(Schema::Object(entry.build()))))
        .required("errors");

    let outcome = OneOfBuilder::new()
        .item(Schema::Object(success.build()))
        .item(Schema::Object(errors.build()));

    Schema::Object(
        ObjectBuilder::new()
            .schema_type(SchemaType::Type(Type::Object))
            .property(base, Schema::OneOf(outcome.build()))
            .required(base)
            .build(),
    )
}
