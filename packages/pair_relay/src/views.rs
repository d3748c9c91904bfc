//! Landing page served at `/`.

use axum::response::{Html, IntoResponse};
use maud::{DOCTYPE, Markup, PreEscaped, html};

pub async fn index() -> impl IntoResponse {
    Html(page().into_string())
}

fn page() -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Pair Relay" }
                style { (PreEscaped(CSS)) }
            }
            body {
                div class="container" {
                    header {
                        h1 { "Pair Relay" }
                        span id="whoami" class="whoami" {}
                        button id="NewChat" class="btn" { "New Chat" }
                    }
                    div id="partner" class="partner" { "Not in a chat" }
                    div id="chat" class="chat" {}
                    div class="composer" {
                        input id="inputText" type="text" placeholder="Type a message" autocomplete="off";
                        button id="SendButton" class="btn btn-primary" { "Send" }
                    }
                }
                script { (PreEscaped(JAVASCRIPT)) }
            }
        }
    }
}

const CSS: &str = r#"
    * {
        margin: 0;
        padding: 0;
        box-sizing: border-box;
    }

    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif;
        background: #f3f4f6;
        min-height: 100vh;
        padding: 20px;
    }

    .container {
        max-width: 720px;
        margin: 0 auto;
        background: white;
        border-radius: 12px;
        box-shadow: 0 10px 30px rgba(0,0,0,0.1);
        display: flex;
        flex-direction: column;
        height: calc(100vh - 40px);
    }

    header {
        display: flex;
        align-items: center;
        gap: 12px;
        padding: 16px 20px;
        border-bottom: 1px solid #e5e7eb;
    }

    h1 {
        font-size: 1.4rem;
        color: #111827;
        flex: 1;
    }

    .whoami, .partner {
        color: #6b7280;
        font-size: 0.9rem;
    }

    .partner {
        padding: 8px 20px;
        border-bottom: 1px solid #f3f4f6;
    }

    .chat {
        flex: 1;
        overflow-y: auto;
        padding: 16px 20px;
    }

    .MessageGroup, .SelfMessageGroup {
        display: flex;
        margin-bottom: 12px;
    }

    .SelfMessageGroup {
        justify-content: flex-end;
    }

    .Name {
        font-size: 0.75rem;
        color: #6b7280;
        margin-bottom: 4px;
    }

    .MessageBubble, .SelfBubble, .ErrorBubble {
        padding: 8px 12px;
        border-radius: 12px;
        margin-bottom: 4px;
        max-width: 480px;
        word-wrap: break-word;
    }

    .MessageBubble {
        background: #e5e7eb;
        color: #111827;
    }

    .SelfBubble {
        background: #667eea;
        color: white;
    }

    .ErrorBubble {
        background: #fee2e2;
        color: #b91c1c;
    }

    .composer {
        display: flex;
        gap: 10px;
        padding: 16px 20px;
        border-top: 1px solid #e5e7eb;
    }

    .composer input {
        flex: 1;
        padding: 10px 12px;
        border: 1px solid #d1d5db;
        border-radius: 6px;
    }

    .btn {
        padding: 10px 20px;
        border: none;
        border-radius: 6px;
        font-weight: 600;
        cursor: pointer;
        background: #6b7280;
        color: white;
    }

    .btn-primary {
        background: #667eea;
    }
"#;

const JAVASCRIPT: &str = r#"
    const input = document.getElementById('inputText');
    const sendBtn = document.getElementById('SendButton');
    const chatBox = document.getElementById('chat');
    const newChatBtn = document.getElementById('NewChat');
    const partnerLabel = document.getElementById('partner');

    let lastSpeaker = null;
    let lastMessageGroup = null;

    const userName = (prompt('Enter your name:') || '').trim();
    document.getElementById('whoami').textContent = userName;

    const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
    const socket = new WebSocket(`${protocol}//${window.location.host}/ws`);

    socket.addEventListener('open', () => {
        socket.send(JSON.stringify({ type: 'register', name: userName }));
    });

    function clearChat() {
        while (chatBox.firstChild) {
            chatBox.removeChild(chatBox.lastChild);
        }
        lastSpeaker = null;
        lastMessageGroup = null;
    }

    function appendBubble(sender, text, className) {
        const bubble = document.createElement('p');
        bubble.className = className;
        bubble.textContent = text;

        if (lastSpeaker !== sender || !lastMessageGroup) {
            lastSpeaker = sender;
            lastMessageGroup = document.createElement('div');
            lastMessageGroup.className = sender === userName ? 'SelfMessageGroup' : 'MessageGroup';

            const wrapper = document.createElement('div');
            const nameTag = document.createElement('p');
            nameTag.className = 'Name';
            nameTag.textContent = sender;
            wrapper.appendChild(nameTag);
            lastMessageGroup.appendChild(wrapper);
            chatBox.appendChild(lastMessageGroup);
        }

        lastMessageGroup.firstChild.appendChild(bubble);
        chatBox.scrollTop = chatBox.scrollHeight;
    }

    socket.addEventListener('message', (event) => {
        let data;
        try {
            data = JSON.parse(event.data);
        } catch (e) {
            console.error('Failed to parse message:', e);
            return;
        }

        if (data.type === 'start_chat') {
            clearChat();
            partnerLabel.textContent = `Chatting with ${data.with} (${data.ip})`;
        } else if (data.type === 'message') {
            appendBubble(data.sender, data.message,
                data.sender === userName ? 'SelfBubble' : 'MessageBubble');
        } else if (data.type === 'error') {
            appendBubble('Error', data.message, 'ErrorBubble');
        }
    });

    socket.addEventListener('close', () => {
        partnerLabel.textContent = 'Disconnected';
    });

    function sendMessage() {
        const message = input.value.trim();
        if (message !== '' && socket.readyState === WebSocket.OPEN) {
            socket.send(JSON.stringify({ type: 'message', message }));
            input.value = '';
        }
    }

    function startNewChat() {
        const target = (prompt('Who do you want to chat with?') || '').trim();
        if (target && socket.readyState === WebSocket.OPEN) {
            socket.send(JSON.stringify({ type: 'new_chat', target }));
        }
    }

    sendBtn.addEventListener('click', sendMessage);
    newChatBtn.addEventListener('click', startNewChat);
    input.addEventListener('keydown', (e) => {
        if (e.key === 'Enter') sendMessage();
    });
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_wires_up_client() {
        let html = page().into_string();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"id="NewChat""#));
        assert!(html.contains("/ws"));
        assert!(html.contains("'register'"));
    }
}
