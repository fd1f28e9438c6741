//! Protobuf messages for the downstream RPC services.
//!
//! Written against `account/v1/account.proto` and `app/v1/app.proto`.

/// `account.v1` messages.
pub mod account {
    /// An account as stored by the account service.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Account {
        #[prost(string, tag = "1")]
        pub account_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub status: ::prost::alloc::string::String,
        #[prost(bool, tag = "3")]
        pub locked: bool,
        #[prost(string, tag = "4")]
        pub currency: ::prost::alloc::string::String,
        #[prost(string, tag = "5")]
        pub acct_type: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "6")]
        pub creation_time: ::core::option::Option<::prost_types::Timestamp>,
        #[prost(message, optional, tag = "7")]
        pub modification_time: ::core::option::Option<::prost_types::Timestamp>,
        #[prost(string, tag = "8")]
        pub timezone: ::prost::alloc::string::String,
    }

    /// `CreateAccount` request.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateAccountRequest {
        #[prost(string, tag = "1")]
        pub currency: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub acct_type: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub timezone: ::prost::alloc::string::String,
    }

    /// `CreateAccount` response.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CreateAccountResponse {
        #[prost(message, optional, tag = "1")]
        pub account: ::core::option::Option<Account>,
    }

    /// `GetAccount` request.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetAccountRequest {
        #[prost(string, tag = "1")]
        pub account_id: ::prost::alloc::string::String,
    }

    /// `GetAccount` response.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetAccountResponse {
        #[prost(message, optional, tag = "1")]
        pub account: ::core::option::Option<Account>,
    }
}

/// `app.v1` messages.
pub mod app {
    /// `CheckHealth` request.
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct CheckHealthRequest {}

    /// `CheckHealth` response.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CheckHealthResponse {
        #[prost(bool, tag = "1")]
        pub is_up: bool,
        #[prost(string, tag = "2")]
        pub region: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub app_id: ::prost::alloc::string::String,
    }
}
