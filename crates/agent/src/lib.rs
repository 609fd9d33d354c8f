//! Relevancy agent process components: configuration, Kubernetes resolver and HTTP API

pub mod api;
pub mod config;
pub mod k8s;
