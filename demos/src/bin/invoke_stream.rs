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

//! Baseline: stream a model reply straight from `bedrock-runtime`, without interception.

use std::io;

use anyhow::Result;
use clap::Parser;
use rescope::{ClientConfig, Session};
use rescope_demos::bedrock::{
    invoke_model_with_response_stream, print_stream, InvokeBody, MODEL_ID, PROMPT,
};
use rescope_demos::config::{context, load_dotenv, DemoConfig};
use rescope_demos::timer::{Note, Timers};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stream a model reply from bedrock-runtime", long_about = None)]
struct Args {}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    env_logger::init();
    Args::parse();

    println!("START");
    let timers = Timers::new();
    timers.record(Note::StartMain);

    let ctx = context();
    let config = DemoConfig::load(&ctx).await?;
    let session = Session::builder()
        .context(ctx)
        .region(config.region.clone())
        .build()?;
    let client = session.client("bedrock-runtime", ClientConfig::new());
    let op = invoke_model_with_response_stream(MODEL_ID, &InvokeBody::new(PROMPT))?;

    println!("EXEC");
    timers.record(Note::StartLambdaExecute);
    let resp = client.call(&op).await?.error_for_status().await?;
    timers.record(Note::EndLambdaExecute);
    print_stream(resp.into_event_stream(), &timers, &mut io::stdout()).await?;
    timers.record(Note::EndMain);

    println!("\n\n");
    for line in timers.report() {
        println!("{line}");
    }
    Ok(())
}
