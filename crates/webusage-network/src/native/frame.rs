//! 네이티브 메시징 프레임 코덱.
//!
//! 프레임 = 4바이트 길이(호스트 바이트 순서) + UTF-8 JSON 본문.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use webusage_core::error::CoreError;

/// 브라우저 → 프로세스 최대 프레임 크기
pub const MAX_INCOMING_FRAME: usize = 64 * 1024 * 1024;

/// 프로세스 → 브라우저 최대 프레임 크기
pub const MAX_OUTGOING_FRAME: usize = 1024 * 1024;

/// 프레임 하나를 읽어 역직렬화. 프레임 경계에서 스트림이 끝나면 `None`.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, CoreError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_ne_bytes(len_buf) as usize;
    if len > MAX_INCOMING_FRAME {
        return Err(CoreError::Validation {
            field: "frame".to_string(),
            message: format!("프레임 크기 초과: {len} bytes"),
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}

/// 값을 직렬화해 프레임 하나로 기록
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), CoreError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(value)?;
    if body.len() > MAX_OUTGOING_FRAME {
        return Err(CoreError::Validation {
            field: "frame".to_string(),
            message: format!("프레임 크기 초과: {} bytes", body.len()),
        });
    }

    writer.write_all(&(body.len() as u32).to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
