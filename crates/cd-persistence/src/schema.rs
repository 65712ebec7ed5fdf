//! Esquema Diesel (escrito a mano). Las tablas las crean los pasos de
//! migración de cada store; este archivo sólo las declara para compilar queries.

diesel::table! {
    migrations (table_name) {
        table_name -> Varchar,
        migration_level -> Int4,
    }
}

diesel::table! {
    pipelines (pipeline_type, owner, repository, pull_request, context, build) {
        #[sql_name = "type"]
        pipeline_type -> Varchar,
        owner -> Varchar,
        repository -> Varchar,
        pull_request -> Int4,
        context -> Varchar,
        build -> Int4,
        status -> Varchar,
        author -> Nullable<Varchar>,
        start_time -> Timestamptz,
        end_time -> Timestamptz,
        duration -> Int8,
    }
}

diesel::table! {
    pipeline_steps (pipeline_type, owner, repository, pull_request, context, build, step_name) {
        #[sql_name = "type"]
        pipeline_type -> Varchar,
        owner -> Varchar,
        repository -> Varchar,
        pull_request -> Int4,
        context -> Varchar,
        build -> Int4,
        step_name -> Varchar,
        step_index -> Int4,
        status -> Varchar,
        start_time -> Timestamptz,
        end_time -> Timestamptz,
        duration -> Int8,
    }
}

diesel::table! {
    releases (owner, repository, version) {
        owner -> Varchar,
        repository -> Varchar,
        version -> Varchar,
        contributors -> Array<Text>,
        release_time -> Timestamptz,
    }
}

diesel::table! {
    deployments (owner, repository, version, environment) {
        owner -> Varchar,
        repository -> Varchar,
        version -> Varchar,
        environment -> Varchar,
        deployment_time -> Timestamptz,
    }
}

diesel::table! {
    pull_requests (owner, repository, pull_request) {
        owner -> Varchar,
        repository -> Varchar,
        pull_request -> Int4,
        author -> Nullable<Varchar>,
        state -> Nullable<Varchar>,
        reviews -> Int4,
        reviewers -> Array<Text>,
        creation_time -> Nullable<Timestamptz>,
        ready_for_review_time -> Nullable<Timestamptz>,
        approved_time -> Nullable<Timestamptz>,
        time_to_review -> Int8,
        merged_time -> Nullable<Timestamptz>,
        time_to_merge -> Int8,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    migrations,
    pipelines,
    pipeline_steps,
    releases,
    deployments,
    pull_requests,
);
