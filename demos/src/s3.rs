// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Uploads through a plain `s3` client.

use bytes::Bytes;
use http::Method;
use rescope::runtime::Operation;

/// Name of the upload operation.
pub const PUT_OBJECT: &str = "PutObject";

/// Build a path-style `PutObject` call storing `body` at `bucket/key`.
///
/// The client adds the payload hash header when it prepares the request.
pub fn put_object(bucket: &str, key: &str, body: impl Into<Bytes>) -> Operation {
    Operation::new(PUT_OBJECT, Method::PUT, format!("/{bucket}/{key}"))
        .with_header("content-type", "application/json")
        .with_body(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rescope::{ClientConfig, Session};
    use rescope_aws_v4::StaticCredentialProvider;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_put_object_operation() {
        let op = put_object("my-bucket", "0f8e.json", r#"{"a":1}"#);
        assert_eq!(op.name(), PUT_OBJECT);
        assert_eq!(op.method(), &Method::PUT);
        assert_eq!(op.path(), "/my-bucket/0f8e.json");
        assert_eq!(op.body().as_ref(), br#"{"a":1}"#);
        assert!(!op.stream_output());
    }

    #[tokio::test]
    async fn test_put_object_signed_for_s3() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/my-bucket/0f8e.json"))
            .and(header_exists("x-amz-content-sha256"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::builder()
            .region("us-east-1")
            .credential_provider(StaticCredentialProvider::new("ak", "sk"))
            .build()
            .unwrap();
        let client = session.client("s3", ClientConfig::new().with_endpoint_url(server.uri()));
        let resp = client
            .call(&put_object("my-bucket", "0f8e.json", "{}"))
            .await
            .unwrap();
        assert!(resp.is_success());

        let received = server.received_requests().await.unwrap();
        let auth = received[0]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(auth.contains("/us-east-1/s3/aws4_request"));
    }
}
