use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
};
use async_openai::Client;

const TRANSCRIBE_PROMPT: &str = "Transcribe all text that is visible in this image. \
Reply with the text only, one line per line of text. Reply with nothing if there is no text.";

/// Asks GPT-4o for the text visible in one image given as a data URL.
pub(crate) async fn transcribe_image(image_url: String) -> anyhow::Result<String> {
    let request = CreateChatCompletionRequestArgs::default()
        .model("gpt-4o")
        .max_tokens(512_u32)
        .messages([ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(vec![
                    ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartTextArgs::default()
                            .text(TRANSCRIBE_PROMPT)
                            .build()?,
                    ),
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImageArgs::default()
                            .image_url(
                                ImageUrlArgs::default()
                                    .url(image_url)
                                    .detail(ImageDetail::High)
                                    .build()?,
                            )
                            .build()?,
                    ),
                ]))
                .build()?,
        )])
        .build()?;

    let ai_client = Client::new();
    let response = tokio::time::timeout(
        tokio::time::Duration::from_secs(300),
        ai_client.chat().create(request),
    )
    .await??;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(anyhow::anyhow!("No content in response from OpenAI"))
}
