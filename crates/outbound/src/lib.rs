//! Outbound messages to the chat gateway.
//!
//! [`MessageService`] is the entry point. It normalizes media with
//! `courier-media`, serializes sends per category with `courier-queue` and
//! talks to the gateway through a [`GatewayClient`].

pub mod appmsg;
pub mod error;
pub mod gateway;
pub mod http;
pub mod payload;
pub mod service;

pub use {
    appmsg::{MusicCard, RichLink},
    error::{Error, Result},
    gateway::{Endpoint, GatewayClient, GatewayResponse},
    http::HttpGateway,
    payload::UploadedFile,
    service::MessageService,
};
