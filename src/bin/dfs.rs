use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use stripefs::client::DfsClient;
use stripefs::config::{ClientArgs, Command, parse_record_sizes, setup_logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ClientArgs::parse();
    setup_logging(false, args.verbose);

    let client = DfsClient::with_timeout(&args.master, Duration::from_secs(args.timeout))?;

    match args.command {
        Command::InitMap { entries } => {
            let records = parse_record_sizes(&entries)?;
            let count = records.len();
            client.init_mapping(records).await?;
            println!("Record sizes set for {} file(s)", count);
        }
        Command::Write {
            filename,
            offset,
            input,
            data,
        } => {
            let payload = match (input, data) {
                (Some(path), _) => tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, Some(data)) => data.into_bytes(),
                (None, None) => anyhow::bail!("either --input or --data is required"),
            };
            let len = payload.len();
            client.write_bytes(&filename, offset, payload).await?;
            println!("Wrote {} bytes to {} at offset {}", len, filename, offset);
        }
        Command::Read {
            filename,
            offset,
            count,
            output,
        } => {
            let bytes = client.read_bytes(&filename, offset, count).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Read {} bytes into {}", bytes.len(), path.display());
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&bytes)?;
                    stdout.flush()?;
                }
            }
        }
        Command::Create { filename } => {
            client.create_file(&filename).await?;
            println!("Created {}", filename);
        }
        Command::Delete { filename } => {
            client.delete_file(&filename).await?;
            println!("Deleted {}", filename);
        }
        Command::Exists { filename } => {
            let exists = client.file_exists(&filename).await?;
            println!("{}", exists);
        }
        Command::Status { json } => {
            let status = client.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }
            println!(
                "ready={} peers={}/{} record_map_set={}",
                status.ready,
                status.peers.len(),
                status.target_size,
                status.record_map_set
            );
            for (index, peer) in status.peers.iter().enumerate() {
                println!("  [{}] {} {:?}", index, peer.address, peer.status);
            }
        }
    }

    Ok(())
}
