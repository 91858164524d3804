use std::{path::PathBuf, sync::Arc};

use clap::Args;
use ferry_store::SearchStoreRef;
use ferry_writer::{ChannelReceiver, Job, TaskSummary, WriterConfig};
use futures::future::join_all;
use snafu::ResultExt;
use tokio::{
    fs::File,
    io::{AsyncBufRead, BufReader},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    error::{CliError, InvalidArgumentSnafu, IoSnafu, Result, TaskJoinSnafu},
    input::distribute,
    store::{StoreArgs, load_config},
};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Path to the job configuration (JSON)
    #[arg(long)]
    config: PathBuf,
    /// NDJSON file with one record per line. Reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Number of concurrent write tasks
    #[arg(long, default_value_t = 1)]
    tasks: usize,
    /// Records buffered per task
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,
    #[clap(flatten)]
    store: StoreArgs,
}

impl WriteArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        if self.tasks == 0 {
            return InvalidArgumentSnafu {
                name: "tasks",
                message: "must be at least 1",
            }
            .fail();
        }

        let mut config = load_config(&self.config).await?;
        let store: SearchStoreRef = Arc::new(self.store.connect(&mut config)?);

        let input: Box<dyn AsyncBufRead + Unpin + Send> = match &self.input {
            Some(path) => Box::new(BufReader::new(File::open(path).await.context(IoSnafu {})?)),
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };

        let summary = write(config, store, input, self.tasks, self.channel_capacity, ct).await?;

        println!(
            "Wrote {} documents from {} records ({} dirty) in {} bulk requests",
            summary.documents, summary.records, summary.dirty, summary.batches
        );

        Ok(())
    }
}

/// Runs a whole write job: prepare the index, then stream `input` to
/// `tasks` concurrent tasks.
pub async fn write<R>(
    config: WriterConfig,
    store: SearchStoreRef,
    input: R,
    tasks: usize,
    channel_capacity: usize,
    ct: CancellationToken,
) -> Result<TaskSummary>
where
    R: AsyncBufRead + Unpin,
{
    let columns = config
        .columns
        .iter()
        .map(|column| column.name.clone())
        .collect::<Vec<_>>();

    let mut job = Job::new(config, store)?;
    job.prepare(&ct).await?;

    let mut senders = Vec::with_capacity(tasks);
    let mut handles = Vec::with_capacity(tasks);
    for task in job.split(tasks)? {
        let (tx, mut rx) = ChannelReceiver::channel(channel_capacity);
        senders.push(tx);

        let ct = ct.clone();
        let id = task.id();
        handles.push((
            id,
            tokio::spawn(async move { task.run(&mut rx, &ct).await }),
        ));
    }

    // Senders are dropped when distribution ends, which lets tasks drain.
    let sent = distribute(input, &columns, senders, &ct).await;

    let (ids, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
    let results = join_all(handles).await;

    let mut total = TaskSummary::default();
    let mut first_error: Option<CliError> = None;
    for (id, result) in ids.into_iter().zip(results) {
        match result.context(TaskJoinSnafu { task: id })? {
            Ok(summary) => {
                info!(task = id, ?summary, "task finished");
                total.records += summary.records;
                total.documents += summary.documents;
                total.dirty += summary.dirty;
                total.batches += summary.batches;
            }
            Err(err) => {
                error!(task = id, error = %err, "task failed");
                first_error.get_or_insert(err.into());
            }
        }
    }

    let sent = sent?;
    if let Some(err) = first_error {
        return Err(err);
    }

    info!(sent, documents = total.documents, dirty = total.dirty, "write finished");
    Ok(total)
}
