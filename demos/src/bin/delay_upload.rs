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

//! Start a streaming call whose prompt is still being uploaded.
//!
//! The call is redirected to `ENDPOINT_URL` and re-signed under the `lambda` scope. The
//! backend waits for `<BUCKET>/<uuid>.json` to appear, which a second task uploads at the
//! same time.

use std::io;

use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use rescope::{ClientConfig, InterceptConfig, InterceptedSession, Session};
use rescope_demos::bedrock::{
    invoke_model_with_response_stream, print_stream, InvokeBody, DELAY_UPLOAD_PREFIX,
    INVOKE_MODEL_WITH_RESPONSE_STREAM, MODEL_ID, PROMPT,
};
use rescope_demos::config::{context, load_dotenv, DemoConfig, RESIGN_SCOPE};
use rescope_demos::s3::put_object;
use rescope_demos::timer::{Note, Timers};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Race a prompt upload against a delayed streaming call", long_about = None)]
struct Args {
    /// Bucket the prompt is uploaded to
    bucket: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    env_logger::init();
    let args = Args::parse();

    println!("START");
    let timers = Timers::new();

    let ctx = context();
    let config = DemoConfig::load(&ctx).await?;
    let endpoint = config.endpoint_url()?.to_string();
    let session = Session::builder()
        .context(ctx)
        .region(config.region.clone())
        .build()?;
    let key = format!("{}.json", Uuid::new_v4());

    let invoke = tokio::spawn(invoke(
        session.clone(),
        endpoint,
        key.clone(),
        timers.clone(),
    ));
    let upload = tokio::spawn(upload(session, args.bucket, key, timers.clone()));
    println!("EXEC");

    let text = invoke.await??;
    timers.record(Note::EndMain);
    debug!("received {} bytes of text", text.len());
    upload.await??;

    println!("\n\n");
    for line in timers.report() {
        println!("{line}");
    }
    Ok(())
}

async fn invoke(session: Session, endpoint: String, key: String, timers: Timers) -> Result<String> {
    timers.record(Note::StartMain);

    let intercepted = InterceptedSession::new(
        session,
        InterceptConfig::new(RESIGN_SCOPE).with_endpoint(INVOKE_MODEL_WITH_RESPONSE_STREAM, endpoint),
    );
    let client = intercepted.client("bedrock-runtime");
    let body = InvokeBody::new("Dummy Message").with_object_key(key);
    let op = invoke_model_with_response_stream(&format!("{DELAY_UPLOAD_PREFIX}{MODEL_ID}"), &body)?;

    timers.record(Note::StartLambdaExecute);
    let resp = client.call(&op).await?.error_for_status().await?;
    timers.record(Note::EndLambdaExecute);

    print_stream(resp.into_event_stream(), &timers, &mut io::stdout()).await
}

async fn upload(
    session: Session,
    bucket: String,
    key: String,
    timers: Timers,
) -> Result<()> {
    let client = session.client("s3", ClientConfig::new());
    let body = serde_json::to_vec(&InvokeBody::new(PROMPT))?;

    timers.record(Note::StartUpload);
    client
        .call(&put_object(&bucket, &key, body))
        .await?
        .error_for_status()
        .await?;
    timers.record(Note::EndUpload);
    info!("uploaded s3://{bucket}/{key}");

    Ok(())
}
